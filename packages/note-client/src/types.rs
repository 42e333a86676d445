//! Request and response types for the note.com API.
//!
//! The platform's responses are undocumented and inconsistent, so responses
//! are kept as raw status + body and inspected with the helpers below instead
//! of being deserialized into fixed structs.

use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Maximum number of characters of a response body kept for diagnostics.
pub const DIAGNOSTIC_BODY_CHARS: usize = 500;

/// Raw HTTP response from a note.com endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response from a JSON value.
    pub fn json(status: u16, value: Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn parsed(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// The `data` envelope.
    pub fn data(&self) -> Option<Value> {
        self.parsed()
            .and_then(|v| v.get("data").cloned())
            .filter(|d| !d.is_null())
    }

    /// Application-level error carried in the `error` envelope.
    ///
    /// The platform returns these with HTTP 200 as well, e.g.
    /// `{"error":{"code":"invalid","message":"cannot edit others draft"}}`.
    pub fn embedded_error(&self) -> Option<EmbeddedError> {
        let parsed = self.parsed()?;
        EmbeddedError::from_value(parsed.get("error")?)
    }

    /// 2xx status and no embedded error.
    pub fn is_accepted(&self) -> bool {
        self.is_success() && self.embedded_error().is_none()
    }

    /// Body cut to [`DIAGNOSTIC_BODY_CHARS`] characters.
    pub fn truncated_body(&self) -> String {
        truncate_chars(&self.body, DIAGNOSTIC_BODY_CHARS)
    }
}

/// Error object embedded in an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedError {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl EmbeddedError {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Self {
                code: None,
                message: Some(s.clone()),
            }),
            Value::Object(map) if map.is_empty() => None,
            Value::Object(map) => Some(Self {
                code: map.get("code").and_then(value_to_string),
                message: map.get("message").and_then(value_to_string),
            }),
            Value::Array(items) if items.is_empty() => None,
            other => Some(Self {
                code: None,
                message: Some(other.to_string()),
            }),
        }
    }
}

impl fmt::Display for EmbeddedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{}: {}", code, message),
            (Some(code), None) => write!(f, "{}", code),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "unknown error"),
        }
    }
}

/// Upload credentials issued by the presigned-post endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedPost {
    /// Storage URL the multipart form is POSTed to
    pub action: String,
    /// Form fields that must accompany the file
    pub fields: Vec<(String, String)>,
    /// Public URL of the image once uploaded
    pub url: Option<String>,
    /// Storage key of the image
    pub path: Option<String>,
}

impl PresignedPost {
    /// Read the presigned post out of a response `data` envelope.
    ///
    /// Returns `None` when `action` is missing or `post` is empty.
    pub fn from_data(data: &Value) -> Option<Self> {
        let action = data.get("action").and_then(value_to_string)?;
        let fields: Vec<(String, String)> = data
            .get("post")
            .and_then(Value::as_object)
            .map(|post| {
                post.iter()
                    .filter_map(|(k, v)| value_to_string(v).map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        if action.is_empty() || fields.is_empty() {
            return None;
        }

        Some(Self {
            action,
            fields,
            url: data.get("url").and_then(value_to_string),
            path: data.get("path").and_then(value_to_string),
        })
    }
}

/// A local file to send as one multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Multipart field name (`file`, `image`)
    pub field_name: String,
    /// File name announced in the part
    pub file_name: String,
    pub mime_type: String,
    pub path: PathBuf,
}

impl UploadFile {
    /// Create an upload part, guessing the MIME type from `path`.
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let mime_type = guess_mime(&path);
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            mime_type,
            path,
        }
    }
}

/// Bytes fetched from an external image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    /// `Content-Type` without parameters
    pub content_type: Option<String>,
}

/// MIME type for a file path, `application/octet-stream` when unknown.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// String form of a scalar JSON value (ids come back as numbers or strings).
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
