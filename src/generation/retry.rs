use std::time::Duration;

use async_trait::async_trait;

/// Why an attempt is being retried. Each cause has its own backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// The request never produced an HTTP response.
    Transport,
    /// HTTP 503 from the generator.
    Overloaded,
    /// HTTP 200 but no usable text (safety block, no candidates).
    EmptyReply,
}

/// Bounded retry policy for a single model.
///
/// The delay before attempt `n + 1` is `base × n`, so it grows linearly with
/// the number of attempts already made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub overloaded_base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(800),
            overloaded_base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Backoff to wait after the 1-based `attempt` failed with `cause`.
    pub fn delay_for(&self, cause: RetryCause, attempt: u32) -> Duration {
        let base = match cause {
            RetryCause::Overloaded => self.overloaded_base_delay,
            RetryCause::Transport | RetryCause::EmptyReply => self.base_delay,
        };
        base * attempt
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Suspends the current task between attempts.
///
/// Injected into the client so tests can observe backoff without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
