//! Error types shared by the feedback pipeline.

use thiserror::Error;

use crate::assessment::extract::{is_failure_sentinel, ExtractError};
use crate::feedback::Stage;
use crate::generation::GenerationError;

/// Coarse classification of every failure the service can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No API key configured.
    ConfigurationMissing,
    /// Overload or transport failure that survived all retries.
    UpstreamTransient,
    /// Safety filter or empty candidate that survived all retries.
    UpstreamBlocked,
    /// Auth, quota, unknown model or server error.
    UpstreamPermanent,
    /// The reply held no usable structured object.
    MalformedUpstreamPayload,
    /// Improvement items were not well-formed. Degrades, never surfaces.
    ValidationFailed,
    /// No submission text or no question.
    InputMissing,
}

/// Failure of a feedback or follow-up request.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("{0}")]
    InputMissing(&'static str),

    #[error("{source}")]
    Generation {
        stage: Stage,
        #[source]
        source: GenerationError,
    },

    #[error("{source}（{label}）")]
    Extract {
        stage: Stage,
        label: &'static str,
        #[source]
        source: ExtractError,
    },

    #[error("{0}")]
    FollowUp(#[source] GenerationError),

    /// Follow-up reply that was blank or carried a failure sentinel.
    #[error("{0}")]
    UnusableAnswer(String),
}

impl FeedbackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputMissing(_) => ErrorKind::InputMissing,
            Self::Generation { source, .. } => source.kind(),
            Self::Extract { source, .. } => source.kind(),
            Self::FollowUp(source) => source.kind(),
            Self::UnusableAnswer(text) if is_failure_sentinel(text) => ErrorKind::UpstreamPermanent,
            Self::UnusableAnswer(_) => ErrorKind::MalformedUpstreamPayload,
        }
    }

    /// Stage the workflow was in when it failed, if it got that far.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InputMissing(_) | Self::FollowUp(_) | Self::UnusableAnswer(_) => None,
            Self::Generation { stage, .. } | Self::Extract { stage, .. } => Some(*stage),
        }
    }
}
