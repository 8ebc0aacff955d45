//! Error taxonomy shared by the clients and the pipeline.

use std::time::Duration;

use thiserror::Error;

/// Coarse category of a [`PlanError`], used for retry decisions and for
/// mapping failures onto HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or non-2xx status from an upstream model.
    Transport,
    /// Well-formed HTTP response without the expected text field.
    ResponseShape,
    /// Text present but not valid JSON, or JSON not matching the plan shape.
    Parse,
    /// A required request field is missing.
    Validation,
}

/// Errors that can occur while producing a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("invalid response structure: {0}")]
    ResponseShape(String),

    #[error("generated plan is not valid: {0}")]
    Parse(String),

    #[error("Missing inputs: {0}")]
    Validation(String),

    #[error("generation failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<PlanError>,
    },

    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Api { .. } | Self::DeadlineExceeded(_) => ErrorKind::Transport,
            Self::ResponseShape(_) => ErrorKind::ResponseShape,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Validation(_) => ErrorKind::Validation,
            Self::RetriesExhausted { last, .. } => last.kind(),
        }
    }

    /// Whether the generation client may try again after this error.
    ///
    /// With `retry_client_errors` set every transport and response-shape
    /// failure is retried. Without it, 4xx statuses other than 408 and 429
    /// are treated as final.
    pub fn is_retryable(&self, retry_client_errors: bool) -> bool {
        match self {
            Self::Network(_) | Self::ResponseShape(_) => true,
            Self::Api { status, .. } => {
                retry_client_errors || !(400..500).contains(status) || matches!(status, 408 | 429)
            }
            Self::Parse(_)
            | Self::Validation(_)
            | Self::RetriesExhausted { .. }
            | Self::DeadlineExceeded(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> PlanError {
        PlanError::Api {
            status,
            body: "boom".to_string(),
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(api(500).kind(), ErrorKind::Transport);
        assert_eq!(
            PlanError::ResponseShape("{}".into()).kind(),
            ErrorKind::ResponseShape
        );
        assert_eq!(PlanError::Parse("x".into()).kind(), ErrorKind::Parse);
        assert_eq!(
            PlanError::Validation("description".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            PlanError::DeadlineExceeded(Duration::from_secs(1)).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn exhausted_keeps_kind_of_last_error() {
        let err = PlanError::RetriesExhausted {
            attempts: 3,
            last: Box::new(PlanError::ResponseShape("{}".into())),
        };
        assert_eq!(err.kind(), ErrorKind::ResponseShape);
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"), "{msg}");
        assert!(msg.contains("invalid response structure"), "{msg}");
    }

    #[test]
    fn retryable_by_default_includes_client_errors() {
        assert!(api(400).is_retryable(true));
        assert!(api(503).is_retryable(true));
        assert!(PlanError::ResponseShape("{}".into()).is_retryable(true));
        assert!(!PlanError::Parse("x".into()).is_retryable(true));
    }

    #[test]
    fn client_errors_final_when_disabled() {
        assert!(!api(400).is_retryable(false));
        assert!(!api(403).is_retryable(false));
        assert!(api(408).is_retryable(false));
        assert!(api(429).is_retryable(false));
        assert!(api(502).is_retryable(false));
    }

    #[test]
    fn validation_message_mentions_missing_inputs() {
        let msg = PlanError::Validation("description is required".into()).to_string();
        assert!(msg.starts_with("Missing inputs"), "{msg}");
    }
}
