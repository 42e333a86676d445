//! Test doubles for the platform API and login.
//!
//! [`MockNoteApi`] answers each endpoint from a queue of canned responses,
//! falling back to a per-endpoint default and finally to `404`. Every call is
//! recorded so tests can assert on order and payloads.
//!
//! ```rust
//! use note_client::ApiResponse;
//! use note_publisher::testing::{Endpoint, MockNoteApi};
//!
//! let api = MockNoteApi::new()
//!     .with_response(Endpoint::DraftSave, ApiResponse::new(400, "bad"))
//!     .with_default(Endpoint::DraftSave, ApiResponse::new(200, "{}"));
//! ```

use async_trait::async_trait;
use note_client::{
    ApiResponse, DownloadedImage, NoteApi, NoteError, PresignedPost, Session, UploadFile,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::auth::{Authenticator, Credentials};
use crate::error::{PublishError, Result};

/// Platform endpoints, as addressed by [`MockNoteApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CreateTextNote,
    GetTextNote,
    DraftSave,
    UpdateTextNote,
    GetNote,
    VerifyDraftVersion,
    PresignImage,
    StorageUpload,
    Eyecatch,
    Download,
    Probe,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateTextNote { payload: Value },
    GetTextNote { id: String },
    DraftSave { id: String, payload: Value },
    UpdateTextNote { id: String, payload: Value },
    GetNote { note_ref: String, latest_draft: bool },
    VerifyDraftVersion { note_ref: String, last_updated_at: String },
    PresignImage { filename: String },
    /// `size` is the staged file's length at call time
    StorageUpload { action: String, file: UploadFile, size: Option<u64> },
    Eyecatch { note_id: String, file: UploadFile },
    Download { url: String },
    Probe { url: String },
}

impl MockCall {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            MockCall::CreateTextNote { .. } => Endpoint::CreateTextNote,
            MockCall::GetTextNote { .. } => Endpoint::GetTextNote,
            MockCall::DraftSave { .. } => Endpoint::DraftSave,
            MockCall::UpdateTextNote { .. } => Endpoint::UpdateTextNote,
            MockCall::GetNote { .. } => Endpoint::GetNote,
            MockCall::VerifyDraftVersion { .. } => Endpoint::VerifyDraftVersion,
            MockCall::PresignImage { .. } => Endpoint::PresignImage,
            MockCall::StorageUpload { .. } => Endpoint::StorageUpload,
            MockCall::Eyecatch { .. } => Endpoint::Eyecatch,
            MockCall::Download { .. } => Endpoint::Download,
            MockCall::Probe { .. } => Endpoint::Probe,
        }
    }
}

type Reply = std::result::Result<ApiResponse, NoteError>;

/// Scriptable in-memory [`NoteApi`].
#[derive(Default, Clone)]
pub struct MockNoteApi {
    queued: Arc<RwLock<HashMap<Endpoint, VecDeque<Reply>>>>,
    defaults: Arc<RwLock<HashMap<Endpoint, ApiResponse>>>,
    downloads: Arc<RwLock<HashMap<String, std::result::Result<DownloadedImage, NoteError>>>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
}

impl MockNoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call to `endpoint`.
    pub fn push_response(&self, endpoint: Endpoint, response: ApiResponse) {
        self.push(endpoint, Ok(response));
    }

    /// Queue a transport failure for the next call to `endpoint`.
    pub fn push_failure(&self, endpoint: Endpoint, error: NoteError) {
        self.push(endpoint, Err(error));
    }

    pub fn with_response(self, endpoint: Endpoint, response: ApiResponse) -> Self {
        self.push_response(endpoint, response);
        self
    }

    pub fn with_failure(self, endpoint: Endpoint, error: NoteError) -> Self {
        self.push_failure(endpoint, error);
        self
    }

    /// Response used once the queue for `endpoint` is empty.
    pub fn with_default(self, endpoint: Endpoint, response: ApiResponse) -> Self {
        self.defaults.write().unwrap().insert(endpoint, response);
        self
    }

    /// Result returned for every download of `url`.
    pub fn with_download(
        self,
        url: impl Into<String>,
        result: std::result::Result<DownloadedImage, NoteError>,
    ) -> Self {
        self.downloads.write().unwrap().insert(url.into(), result);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint() == endpoint)
            .collect()
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.endpoint() == endpoint)
            .count()
    }

    fn push(&self, endpoint: Endpoint, reply: Reply) {
        self.queued
            .write()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(reply);
    }

    fn answer(&self, call: MockCall) -> Reply {
        let endpoint = call.endpoint();
        self.calls.write().unwrap().push(call);

        if let Some(reply) = self
            .queued
            .write()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        Ok(self
            .defaults
            .read()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .unwrap_or_else(|| ApiResponse::new(404, "not found")))
    }
}

/// `NoteError` is not `Clone`; rebuild an equivalent value.
fn replay(error: &NoteError) -> NoteError {
    match error {
        NoteError::Api { status, message } => NoteError::Api {
            status: *status,
            message: message.clone(),
        },
        NoteError::Config(m) => NoteError::Config(m.clone()),
        NoteError::Network(m) => NoteError::Network(m.clone()),
        NoteError::Io(e) => NoteError::Io(std::io::Error::new(e.kind(), e.to_string())),
    }
}

#[async_trait]
impl NoteApi for MockNoteApi {
    async fn create_text_note(
        &self,
        _session: &Session,
        payload: &Value,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::CreateTextNote {
            payload: payload.clone(),
        })
    }

    async fn get_text_note(&self, _session: &Session, id: &str) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::GetTextNote { id: id.to_string() })
    }

    async fn draft_save(
        &self,
        _session: &Session,
        id: &str,
        payload: &Value,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::DraftSave {
            id: id.to_string(),
            payload: payload.clone(),
        })
    }

    async fn update_text_note(
        &self,
        _session: &Session,
        id: &str,
        payload: &Value,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::UpdateTextNote {
            id: id.to_string(),
            payload: payload.clone(),
        })
    }

    async fn get_note(
        &self,
        _session: &Session,
        note_ref: &str,
        latest_draft: bool,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::GetNote {
            note_ref: note_ref.to_string(),
            latest_draft,
        })
    }

    async fn verify_draft_version(
        &self,
        _session: &Session,
        note_ref: &str,
        last_updated_at: &str,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::VerifyDraftVersion {
            note_ref: note_ref.to_string(),
            last_updated_at: last_updated_at.to_string(),
        })
    }

    async fn presign_image_upload(
        &self,
        _session: &Session,
        filename: &str,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::PresignImage {
            filename: filename.to_string(),
        })
    }

    async fn upload_to_storage(
        &self,
        post: &PresignedPost,
        file: &UploadFile,
    ) -> note_client::Result<ApiResponse> {
        let size = std::fs::metadata(&file.path).ok().map(|m| m.len());
        self.answer(MockCall::StorageUpload {
            action: post.action.clone(),
            file: file.clone(),
            size,
        })
    }

    async fn upload_eyecatch(
        &self,
        _session: &Session,
        note_id: &str,
        file: &UploadFile,
    ) -> note_client::Result<ApiResponse> {
        self.answer(MockCall::Eyecatch {
            note_id: note_id.to_string(),
            file: file.clone(),
        })
    }

    async fn download(&self, url: &str) -> note_client::Result<DownloadedImage> {
        self.calls.write().unwrap().push(MockCall::Download {
            url: url.to_string(),
        });
        match self.downloads.read().unwrap().get(url) {
            Some(Ok(image)) => Ok(image.clone()),
            Some(Err(e)) => Err(replay(e)),
            None => Err(NoteError::Api {
                status: 404,
                message: format!("no canned download for {}", url),
            }),
        }
    }

    async fn probe(&self, url: &str) -> note_client::Result<u16> {
        let has_script = self.queued.read().unwrap().contains_key(&Endpoint::Probe)
            || self.defaults.read().unwrap().contains_key(&Endpoint::Probe);
        let reply = self.answer(MockCall::Probe {
            url: url.to_string(),
        });
        if !has_script {
            return Ok(200);
        }
        reply.map(|r| r.status)
    }
}

enum StubLogin {
    Session(Session),
    Failure(String),
}

/// [`Authenticator`] returning a fixed session or failure.
pub struct StubAuthenticator {
    result: StubLogin,
    logins: Arc<RwLock<Vec<String>>>,
}

impl StubAuthenticator {
    /// Logs in with `session`.
    pub fn new(session: Session) -> Self {
        Self {
            result: StubLogin::Session(session),
            logins: Arc::default(),
        }
    }

    /// A session holding one cookie, enough to pass the emptiness check.
    pub fn logged_in() -> Self {
        Self::new(Session::new().with_cookie("_note_session_v5", "stub"))
    }

    /// Returns an empty session, as a browser login that found no form does.
    pub fn empty() -> Self {
        Self::new(Session::new())
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            result: StubLogin::Failure(reason.into()),
            logins: Arc::default(),
        }
    }

    /// Emails passed to `login`, in order.
    pub fn logins(&self) -> Vec<String> {
        self.logins.read().unwrap().clone()
    }
}

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        self.logins.write().unwrap().push(credentials.email.clone());
        match &self.result {
            StubLogin::Session(session) => Ok(session.clone()),
            StubLogin::Failure(reason) => Err(PublishError::AuthFailure {
                reason: reason.clone(),
            }),
        }
    }
}
