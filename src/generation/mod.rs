//! Generation client: one prompt in, one text out, with per-model retries
//! and a single fallback model.

pub mod payload;
pub mod retry;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use payload::{decode_reply, DecodedReply, GenerateContentRequest};
use retry::{RetryCause, RetryPolicy, Sleeper, TokioSleeper};
use transport::{Transport, TransportResponse};

/// Failures surfaced by the generation client.
///
/// Messages are user-facing and all start with the `エラー` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("エラー: APIキーが未設定です。サーバーの .env で GEMINI_API_KEY を設定してください。")]
    ConfigurationMissing,

    #[error("エラー: プロンプトが空です。")]
    EmptyPrompt,

    #[error("エラー: 例外が発生しました → {0}")]
    Transport(String),

    #[error("エラー: サービスが混雑しています（model={model}）。")]
    Overloaded { model: String },

    #[error("エラー: モデル応答が安全ポリシーでブロック/空でした（blockReason={block_reason} safety={safety}）。")]
    Blocked { block_reason: String, safety: String },

    #[error("エラー: リクエスト過多です。しばらくしてから再実行してください。")]
    RateLimited,

    #[error("エラー: 認証/権限に問題があります。APIキーや割り当てをご確認ください。")]
    Unauthorized,

    #[error("エラー: モデルIDが認識されません。指定モデルをご確認ください。")]
    UnknownModel { model: String },

    #[error("エラー: サーバー側で問題が発生しました。時間を置いて再実行してください。")]
    Server { status: u16 },

    #[error("エラー: サービス応答に問題（HTTP {status}）。body={body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("エラー: すべてのモデルで応答が得られませんでした。")]
    Exhausted { models: Vec<String> },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationMissing => ErrorKind::ConfigurationMissing,
            Self::EmptyPrompt => ErrorKind::InputMissing,
            Self::Transport(_) | Self::Overloaded { .. } | Self::Exhausted { .. } => {
                ErrorKind::UpstreamTransient
            }
            Self::Blocked { .. } => ErrorKind::UpstreamBlocked,
            Self::RateLimited
            | Self::Unauthorized
            | Self::UnknownModel { .. }
            | Self::Server { .. }
            | Self::UnexpectedStatus { .. } => ErrorKind::UpstreamPermanent,
        }
    }
}

/// Anything that turns a prompt into text. The pipeline only sees this.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// Result of a single attempt against one model.
enum Attempt {
    Done(String),
    Retry(RetryCause, GenerationError),
    Abort(GenerationError),
}

/// Retrying, falling-back client over a [`Transport`].
pub struct GenerationClient {
    transport: Arc<dyn Transport>,
    api_key: Option<String>,
    fallback_model: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GenerationClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_key: Option<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            api_key,
            fallback_model: fallback_model.into(),
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Primary first, then the fallback unless it is the same model.
    fn candidate_models<'a>(&'a self, primary: &'a str) -> Vec<&'a str> {
        let mut models = vec![primary];
        if self.fallback_model != primary {
            models.push(&self.fallback_model);
        }
        models
    }

    async fn attempt(&self, model: &str, api_key: &str, request: &GenerateContentRequest) -> Attempt {
        match self.transport.send(model, api_key, request).await {
            Err(e) => Attempt::Retry(RetryCause::Transport, GenerationError::Transport(e)),
            Ok(response) => classify(model, response),
        }
    }

    /// Try every attempt for one model. Returns the text, or the error that
    /// ended this model's turn.
    async fn run_model(
        &self,
        model: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, GenerationError> {
        let mut attempt_no = 1;
        loop {
            match self.attempt(model, api_key, request).await {
                Attempt::Done(text) => return Ok(text),
                Attempt::Abort(err) => {
                    warn!("Model {} failed permanently: {}", model, err);
                    return Err(err);
                }
                Attempt::Retry(cause, err) => {
                    if !self.policy.allows_retry_after(attempt_no) {
                        warn!("Model {} exhausted after {} attempts: {}", model, attempt_no, err);
                        return Err(err);
                    }
                    let delay = self.policy.delay_for(cause, attempt_no);
                    debug!(
                        "Attempt {} on {} failed ({:?}), retrying in {:?}",
                        attempt_no, model, cause, delay
                    );
                    self.sleeper.sleep(delay).await;
                    attempt_no += 1;
                }
            }
        }
    }
}

fn classify(model: &str, response: TransportResponse) -> Attempt {
    match response.status {
        200 => match decode_reply(&response.body) {
            DecodedReply::Text { text, .. } => Attempt::Done(text),
            DecodedReply::Empty { block_reason, safety } => Attempt::Retry(
                RetryCause::EmptyReply,
                GenerationError::Blocked { block_reason, safety },
            ),
        },
        503 => Attempt::Retry(
            RetryCause::Overloaded,
            GenerationError::Overloaded {
                model: model.to_string(),
            },
        ),
        429 => Attempt::Abort(GenerationError::RateLimited),
        401 | 403 => Attempt::Abort(GenerationError::Unauthorized),
        404 => Attempt::Abort(GenerationError::UnknownModel {
            model: model.to_string(),
        }),
        status if status >= 500 => Attempt::Abort(GenerationError::Server { status }),
        status => {
            let body = response.body.to_string().chars().take(800).collect();
            Attempt::Abort(GenerationError::UnexpectedStatus { status, body })
        }
    }
}

#[async_trait]
impl TextGenerator for GenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(GenerationError::ConfigurationMissing)?;
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let request = GenerateContentRequest::new(prompt, max_output_tokens);
        let models = self.candidate_models(model);
        let mut last_error = None;

        for (index, candidate) in models.iter().enumerate() {
            if index > 0 {
                info!("Falling back to model {}", candidate);
            }
            match self.run_model(candidate, api_key, &request).await {
                Ok(text) => return Ok(text),
                // A model that keeps refusing the prompt ends the request.
                Err(err @ GenerationError::Blocked { .. }) => return Err(err),
                Err(err) => last_error = Some(err),
            }
        }

        // Transient exhaustion on the last model becomes the terminal error;
        // anything more specific is surfaced as-is.
        Err(match last_error {
            Some(err) if err.kind() != ErrorKind::UpstreamTransient => err,
            _ => GenerationError::Exhausted {
                models: models.iter().map(|m| m.to_string()).collect(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retry::testing::RecordingSleeper;
    use std::time::Duration;
    use transport::testing::{blocked_reply, status, text_reply, ScriptedTransport};

    const PRIMARY: &str = "primary-model";
    const FALLBACK: &str = "fallback-model";

    fn make_client(
        script: Vec<Result<TransportResponse, String>>,
    ) -> (GenerationClient, Arc<ScriptedTransport>, Arc<RecordingSleeper>) {
        let transport = Arc::new(ScriptedTransport::new(script));
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = GenerationClient::new(transport.clone(), Some("key".to_string()), FALLBACK)
            .with_sleeper(sleeper.clone());
        (client, transport, sleeper)
    }

    #[tokio::test]
    async fn returns_text_on_first_success() {
        let (client, transport, sleeper) = make_client(vec![text_reply("hello")]);
        let text = client.generate("prompt", PRIMARY, 100).await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(transport.calls(), vec![PRIMARY]);
        assert!(sleeper.durations().is_empty());
    }

    #[tokio::test]
    async fn overloaded_everywhere_tries_three_times_per_model() {
        let (client, transport, sleeper) = make_client(vec![status(503); 6]);
        let err = client.generate("prompt", PRIMARY, 100).await.unwrap_err();

        assert!(matches!(err, GenerationError::Exhausted { .. }));
        assert_eq!(err.kind(), ErrorKind::UpstreamTransient);
        assert_eq!(
            transport.calls(),
            vec![PRIMARY, PRIMARY, PRIMARY, FALLBACK, FALLBACK, FALLBACK]
        );
        // No sleep after the last attempt of each model.
        assert_eq!(
            sleeper.durations(),
            vec![
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[tokio::test]
    async fn overload_then_success_recovers_on_same_model() {
        let (client, transport, _) = make_client(vec![status(503), text_reply("ok")]);
        assert_eq!(client.generate("prompt", PRIMARY, 100).await.unwrap(), "ok");
        assert_eq!(transport.calls(), vec![PRIMARY, PRIMARY]);
    }

    #[tokio::test]
    async fn permanent_failure_skips_retries_but_uses_fallback() {
        let (client, transport, sleeper) = make_client(vec![status(404), text_reply("from fallback")]);
        let text = client.generate("prompt", PRIMARY, 100).await.unwrap();
        assert_eq!(text, "from fallback");
        assert_eq!(transport.calls(), vec![PRIMARY, FALLBACK]);
        assert!(sleeper.durations().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_on_both_models_is_surfaced() {
        let (client, transport, _) = make_client(vec![status(429), status(429)]);
        let err = client.generate("prompt", PRIMARY, 100).await.unwrap_err();
        assert_eq!(err, GenerationError::RateLimited);
        assert_eq!(err.kind(), ErrorKind::UpstreamPermanent);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn auth_and_server_errors_are_permanent() {
        let (client, _, _) = make_client(vec![status(401), status(500)]);
        let err = client.generate("prompt", PRIMARY, 100).await.unwrap_err();
        assert_eq!(err, GenerationError::Server { status: 500 });
        assert!(err.to_string().starts_with("エラー"));
    }

    #[tokio::test]
    async fn blocked_reply_is_retried_then_reported_without_fallback() {
        let (client, transport, sleeper) = make_client(vec![blocked_reply(); 6]);
        let err = client.generate("prompt", PRIMARY, 100).await.unwrap_err();
        match &err {
            GenerationError::Blocked { block_reason, .. } => assert_eq!(block_reason, "SAFETY"),
            other => panic!("expected blocked error, got {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::UpstreamBlocked);
        assert_eq!(transport.calls(), vec![PRIMARY; 3]);
        assert_eq!(
            sleeper.durations(),
            vec![Duration::from_millis(800), Duration::from_millis(1600)]
        );
    }

    #[tokio::test]
    async fn transport_errors_retry_with_backoff() {
        let (client, transport, sleeper) = make_client(vec![
            Err("connection reset".to_string()),
            Err("connection reset".to_string()),
            text_reply("third time"),
        ]);
        assert_eq!(client.generate("prompt", PRIMARY, 100).await.unwrap(), "third time");
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(
            sleeper.durations(),
            vec![Duration::from_millis(800), Duration::from_millis(1600)]
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_network() {
        let transport = Arc::new(ScriptedTransport::new(vec![text_reply("never")]));
        let client = GenerationClient::new(transport.clone(), None, FALLBACK);
        let err = client.generate("prompt", PRIMARY, 100).await.unwrap_err();
        assert_eq!(err, GenerationError::ConfigurationMissing);
        assert_eq!(err.kind(), ErrorKind::ConfigurationMissing);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let (client, transport, _) = make_client(vec![text_reply("never")]);
        let err = client.generate("   ", PRIMARY, 100).await.unwrap_err();
        assert_eq!(err, GenerationError::EmptyPrompt);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn fallback_equal_to_primary_is_not_repeated() {
        let (client, transport, _) = make_client(vec![status(503); 6]);
        let _ = client.generate("prompt", FALLBACK, 100).await;
        assert_eq!(transport.calls(), vec![FALLBACK, FALLBACK, FALLBACK]);
    }

    #[tokio::test]
    async fn unexpected_status_includes_clipped_body() {
        let (client, _, _) = make_client(vec![
            Ok(TransportResponse {
                status: 400,
                body: serde_json::json!({ "error": "bad request" }),
            }),
            Ok(TransportResponse {
                status: 400,
                body: serde_json::json!({ "error": "bad request" }),
            }),
        ]);
        let err = client.generate("prompt", PRIMARY, 100).await.unwrap_err();
        match err {
            GenerationError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("bad request"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
