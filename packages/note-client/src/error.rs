//! Error types for the note.com client.

use thiserror::Error;

/// Result type for note.com client operations.
pub type Result<T> = std::result::Result<T, NoteError>;

/// note.com client errors.
#[derive(Debug, Error)]
pub enum NoteError {
    /// Configuration error (invalid base URL, bad header value)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status where the caller needs a body (downloads)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Local file could not be read for upload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for NoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NoteError::Network(format!("request timed out: {}", err))
        } else {
            NoteError::Network(err.to_string())
        }
    }
}
