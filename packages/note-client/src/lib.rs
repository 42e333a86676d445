//! Pure note.com REST API client
//!
//! A minimal client for the undocumented endpoints the note.com editor uses:
//! article creation and fetch, draft save, update/publish, presigned image
//! uploads and the eyecatch (cover image) upload. No publishing logic lives
//! here; see the `note-publisher` crate for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use note_client::{NoteApi, NoteClient, Session};
//! use serde_json::json;
//!
//! let client = NoteClient::new()?;
//! let session = Session::from_cookies(cookies);
//!
//! let resp = client
//!     .create_text_note(&session, &json!({"name": "Title", "body": "<p>Hi</p>"}))
//!     .await?;
//! if resp.is_accepted() {
//!     println!("{:?}", resp.data());
//! }
//! ```

pub mod api;
pub mod error;
pub mod session;
pub mod types;

pub use api::NoteApi;
pub use error::{NoteError, Result};
pub use session::Session;
pub use types::{
    ApiResponse, DownloadedImage, EmbeddedError, PresignedPost, UploadFile, value_to_string,
};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://note.com";

const EDITOR_ORIGIN: &str = "https://editor.note.com";
const EDITOR_REFERER: &str = "https://editor.note.com/";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Per-call timeouts.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// JSON API calls (create, draft save, publish)
    pub api: Duration,
    /// Metadata lookups and version verification
    pub metadata: Duration,
    /// Storage and eyecatch uploads
    pub upload: Duration,
    /// External image downloads
    pub download: Duration,
    /// Reachability probes of uploaded images
    pub probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            api: Duration::from_secs(30),
            metadata: Duration::from_secs(20),
            upload: Duration::from_secs(60),
            download: Duration::from_secs(30),
            probe: Duration::from_secs(15),
        }
    }
}

/// note.com API client backed by reqwest.
#[derive(Clone)]
pub struct NoteClient {
    http_client: Client,
    base_url: String,
    timeouts: Timeouts,
}

impl NoteClient {
    /// Create a client with default timeouts against note.com.
    pub fn new() -> Result<Self> {
        Self::with_timeouts(Timeouts::default())
    }

    /// Create a client with custom timeouts.
    pub fn with_timeouts(timeouts: Timeouts) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeouts.api)
            .build()
            .map_err(|e| NoteError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts,
        })
    }

    /// Set a custom base URL (staging hosts, local proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Headers the editor sends with every API call.
    fn editor_headers(&self, session: &Session, json_body: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(header::ORIGIN, HeaderValue::from_static(EDITOR_ORIGIN));
        headers.insert(header::REFERER, HeaderValue::from_static(EDITOR_REFERER));
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        if json_body {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        } else {
            headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        }

        if !session.is_empty() {
            let cookie = HeaderValue::from_str(&session.cookie_header())
                .map_err(|e| NoteError::Config(format!("Invalid cookie value: {}", e)))?;
            headers.insert(header::COOKIE, cookie);
        }

        // 422 responses without these
        if let Some(token) = session.csrf_token() {
            let value = HeaderValue::from_str(token)
                .map_err(|e| NoteError::Config(format!("Invalid CSRF token: {}", e)))?;
            headers.insert("X-CSRF-Token", value.clone());
            headers.insert("X-XSRF-TOKEN", value);
        }

        Ok(headers)
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<ApiResponse> {
        let start = std::time::Instant::now();

        let response = request.send().await.map_err(|e| {
            warn!(endpoint, error = %e, "note request failed");
            NoteError::from(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        debug!(
            endpoint,
            status,
            duration_ms = start.elapsed().as_millis(),
            "note API call"
        );

        Ok(ApiResponse::new(status, body))
    }

    async fn file_part(file: &UploadFile) -> Result<Part> {
        let bytes = tokio::fs::read(&file.path).await?;
        let part = Part::bytes(bytes)
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)?;
        Ok(part)
    }
}

#[async_trait]
impl NoteApi for NoteClient {
    async fn create_text_note(&self, session: &Session, payload: &Value) -> Result<ApiResponse> {
        let request = self
            .http_client
            .post(self.url("/api/v1/text_notes"))
            .headers(self.editor_headers(session, true)?)
            .json(payload);
        self.send(request, "text_notes.create").await
    }

    async fn get_text_note(&self, session: &Session, id: &str) -> Result<ApiResponse> {
        let request = self
            .http_client
            .get(self.url(&format!("/api/v1/text_notes/{}", id)))
            .headers(self.editor_headers(session, true)?)
            .timeout(self.timeouts.metadata);
        self.send(request, "text_notes.get").await
    }

    async fn draft_save(
        &self,
        session: &Session,
        id: &str,
        payload: &Value,
    ) -> Result<ApiResponse> {
        let request = self
            .http_client
            .post(self.url("/api/v1/text_notes/draft_save"))
            .headers(self.editor_headers(session, true)?)
            .query(&[("id", id), ("is_temp_saved", "true")])
            .json(payload);
        self.send(request, "text_notes.draft_save").await
    }

    async fn update_text_note(
        &self,
        session: &Session,
        id: &str,
        payload: &Value,
    ) -> Result<ApiResponse> {
        let request = self
            .http_client
            .put(self.url(&format!("/api/v1/text_notes/{}", id)))
            .headers(self.editor_headers(session, true)?)
            .json(payload);
        self.send(request, "text_notes.update").await
    }

    async fn get_note(
        &self,
        session: &Session,
        note_ref: &str,
        latest_draft: bool,
    ) -> Result<ApiResponse> {
        let path = if latest_draft {
            format!("/api/v3/notes/{}/latest_draft", note_ref)
        } else {
            format!("/api/v3/notes/{}", note_ref)
        };
        let request = self
            .http_client
            .get(self.url(&path))
            .headers(self.editor_headers(session, true)?)
            .timeout(self.timeouts.metadata);
        self.send(request, "notes.get").await
    }

    async fn verify_draft_version(
        &self,
        session: &Session,
        note_ref: &str,
        last_updated_at: &str,
    ) -> Result<ApiResponse> {
        let request = self
            .http_client
            .get(self.url(&format!(
                "/api/v3/notes/{}/latest_draft/version_verification",
                note_ref
            )))
            .headers(self.editor_headers(session, true)?)
            .query(&[("last_updated_at", last_updated_at)])
            .timeout(self.timeouts.metadata);
        self.send(request, "notes.version_verification").await
    }

    async fn presign_image_upload(
        &self,
        session: &Session,
        filename: &str,
    ) -> Result<ApiResponse> {
        let form = Form::new().text("filename", filename.to_string());
        let request = self
            .http_client
            .post(self.url("/api/v3/images/upload/presigned_post"))
            .headers(self.editor_headers(session, false)?)
            .multipart(form);
        self.send(request, "images.presigned_post").await
    }

    async fn upload_to_storage(
        &self,
        post: &PresignedPost,
        file: &UploadFile,
    ) -> Result<ApiResponse> {
        let mut form = Form::new();
        for (name, value) in &post.fields {
            form = form.text(name.clone(), value.clone());
        }
        // Storage rejects the policy unless the file part comes last
        form = form.part(file.field_name.clone(), Self::file_part(file).await?);

        let request = self
            .http_client
            .post(&post.action)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .header(header::ACCEPT, "*/*")
            .header(header::ORIGIN, EDITOR_ORIGIN)
            .header(header::REFERER, EDITOR_REFERER)
            .timeout(self.timeouts.upload)
            .multipart(form);
        self.send(request, "storage.upload").await
    }

    async fn upload_eyecatch(
        &self,
        session: &Session,
        note_id: &str,
        file: &UploadFile,
    ) -> Result<ApiResponse> {
        let form = Form::new()
            .text("note_id", note_id.to_string())
            .part(file.field_name.clone(), Self::file_part(file).await?);

        let request = self
            .http_client
            .post(self.url("/api/v1/image_upload/note_eyecatch"))
            .headers(self.editor_headers(session, false)?)
            .timeout(self.timeouts.upload)
            .multipart(form);
        self.send(request, "image_upload.note_eyecatch").await
    }

    async fn download(&self, url: &str) -> Result<DownloadedImage> {
        let response = self
            .http_client
            .get(url)
            .header(header::USER_AGENT, "Mozilla/5.0")
            .timeout(self.timeouts.download)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NoteError::Api {
                status: status.as_u16(),
                message: types::truncate_chars(&body, types::DIAGNOSTIC_BODY_CHARS),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let bytes = response.bytes().await?.to_vec();
        debug!(url, size = bytes.len(), content_type = ?content_type, "Downloaded image");

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }

    async fn probe(&self, url: &str) -> Result<u16> {
        let response = self
            .http_client
            .get(url)
            .header(header::USER_AGENT, "Mozilla/5.0")
            .timeout(self.timeouts.probe)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}
