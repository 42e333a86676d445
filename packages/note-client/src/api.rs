//! The note.com endpoint surface as a trait.
//!
//! Every method returns the raw [`ApiResponse`]; deciding what counts as
//! success (status class, embedded `error` envelope, required `data` fields)
//! is left to the caller. `Err` is reserved for transport failures.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::session::Session;
use crate::types::{ApiResponse, DownloadedImage, PresignedPost, UploadFile};

#[async_trait]
pub trait NoteApi: Send + Sync {
    /// `POST /api/v1/text_notes`
    async fn create_text_note(&self, session: &Session, payload: &Value) -> Result<ApiResponse>;

    /// `GET /api/v1/text_notes/{id}`
    async fn get_text_note(&self, session: &Session, id: &str) -> Result<ApiResponse>;

    /// `POST /api/v1/text_notes/draft_save?id={id}&is_temp_saved=true`
    async fn draft_save(&self, session: &Session, id: &str, payload: &Value)
        -> Result<ApiResponse>;

    /// `PUT /api/v1/text_notes/{id}`
    async fn update_text_note(
        &self,
        session: &Session,
        id: &str,
        payload: &Value,
    ) -> Result<ApiResponse>;

    /// `GET /api/v3/notes/{ref}/latest_draft`, or `GET /api/v3/notes/{ref}`
    /// when `latest_draft` is false.
    async fn get_note(
        &self,
        session: &Session,
        note_ref: &str,
        latest_draft: bool,
    ) -> Result<ApiResponse>;

    /// `GET /api/v3/notes/{ref}/latest_draft/version_verification`
    async fn verify_draft_version(
        &self,
        session: &Session,
        note_ref: &str,
        last_updated_at: &str,
    ) -> Result<ApiResponse>;

    /// `POST /api/v3/images/upload/presigned_post`
    async fn presign_image_upload(&self, session: &Session, filename: &str)
        -> Result<ApiResponse>;

    /// Multipart POST of `file` to the storage target of a presigned post.
    async fn upload_to_storage(&self, post: &PresignedPost, file: &UploadFile)
        -> Result<ApiResponse>;

    /// `POST /api/v1/image_upload/note_eyecatch`
    async fn upload_eyecatch(
        &self,
        session: &Session,
        note_id: &str,
        file: &UploadFile,
    ) -> Result<ApiResponse>;

    /// Fetch an external image. Non-2xx responses are `NoteError::Api`.
    async fn download(&self, url: &str) -> Result<DownloadedImage>;

    /// GET a URL and report only its status code.
    async fn probe(&self, url: &str) -> Result<u16>;
}
