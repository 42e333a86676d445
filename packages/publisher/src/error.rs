//! Typed errors for the publishing workflow.
//!
//! Only fatal conditions are errors. Single image or cover-image failures are
//! recorded as warning events and never surface here.

use note_client::{ApiResponse, NoteError};
use thiserror::Error;

/// Errors that abort a publishing run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Login produced no session
    #[error("login failed: {reason}")]
    AuthFailure { reason: String },

    /// The article referenced by `note_id` does not exist
    #[error("article not found: {id}")]
    NotFound { id: String },

    /// HTTP error status or embedded application error
    #[error("{step} rejected ({status}): {body}")]
    UpstreamRejected {
        step: &'static str,
        status: u16,
        body: String,
    },

    /// Timeout or connection failure
    #[error("{step} network error: {message}")]
    Network { step: &'static str, message: String },

    /// Local file could not be read or staged
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    /// Rejection carrying the response status and truncated body.
    pub fn rejected(step: &'static str, response: &ApiResponse) -> Self {
        let body = match response.embedded_error() {
            Some(err) if response.is_success() => format!("{} ({})", err, response.truncated_body()),
            _ => response.truncated_body(),
        };
        PublishError::UpstreamRejected {
            step,
            status: response.status,
            body,
        }
    }

    /// Map a client error raised during `step`.
    pub fn from_client(step: &'static str, err: NoteError) -> Self {
        match err {
            NoteError::Api { status, message } => PublishError::UpstreamRejected {
                step,
                status,
                body: message,
            },
            NoteError::Io(e) => PublishError::Io(e),
            other => PublishError::Network {
                step,
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for publishing operations.
pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejected_mentions_embedded_error() {
        let resp = ApiResponse::json(
            200,
            json!({"error": {"code": "invalid", "message": "cannot edit others draft"}}),
        );
        let err = PublishError::rejected("draft_save", &resp);
        let text = err.to_string();
        assert!(text.starts_with("draft_save rejected (200): invalid: cannot edit others draft"));
    }

    #[test]
    fn test_from_client_network() {
        let err = PublishError::from_client("create", NoteError::Network("timed out".into()));
        assert!(matches!(err, PublishError::Network { step: "create", .. }));
    }
}
