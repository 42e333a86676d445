//! Article orchestrator: login, images, draft, cover and publish.
//!
//! # Architecture
//!
//! ```text
//! Document + Credentials
//!     │
//!     ├─► Authenticator::login ──► Session
//!     ├─► images::process_inline_images  (warn + keep URL on failure)
//!     ├─► create article / fetch existing ──► ArticleHandle
//!     ├─► draft-save, first accepted payload variant wins
//!     ├─► reconcile::reconcile_version  (best-effort)
//!     ├─► images::upload_cover_image    (warn on failure)
//!     └─► publish                       (when requested)
//! ```
//!
//! Every call is awaited in sequence. Fatal conditions end the run with a
//! [`PublishError`]; degraded ones become warning events in the report.

use note_client::{value_to_string, ApiResponse, NoteApi, Session, DEFAULT_BASE_URL};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{Authenticator, Credentials};
use crate::document::Document;
use crate::error::{PublishError, Result};
use crate::events::{EventLog, Step};
use crate::images::{process_inline_images, upload_cover_image, CoverUploadPolicy};
use crate::markdown::render_html;
use crate::payloads::{publish_payload, DraftContent, DRAFT_SAVE_VARIANTS};
use crate::reconcile::reconcile_version;

/// Lifecycle of one publishing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    Unauthenticated,
    Authenticated,
    Drafted { id: String, key: String },
    Published,
    Failed,
}

/// Identity and version metadata of the article being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleHandle {
    /// Numeric text-note id, used by draft-save and publish
    pub id: String,
    /// Public article key (`n...`)
    pub key: String,
    pub last_updated_at: Option<String>,
    /// Note id as known to the v3 endpoints
    pub note_ref: Option<String>,
    pub note_key: Option<String>,
    pub created_at: Option<String>,
}

impl ArticleHandle {
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            last_updated_at: None,
            note_ref: None,
            note_key: None,
            created_at: None,
        }
    }

    /// Build a handle from a `data` envelope carrying both `id` and `key`.
    pub fn from_data(data: &Value) -> Option<Self> {
        let id = data.get("id").and_then(value_to_string)?;
        let key = data.get("key").and_then(value_to_string)?;
        let mut handle = Self::new(id, key);
        handle.absorb(data);
        Some(handle)
    }

    /// Fill metadata fields that are still unknown from a `data` envelope.
    pub fn absorb(&mut self, data: &Value) {
        let field = |name: &str| data.get(name).and_then(value_to_string);

        if self.last_updated_at.is_none() {
            self.last_updated_at = field("last_updated_at").or_else(|| field("updated_at"));
        }
        if self.note_ref.is_none() {
            self.note_ref = field("note_id");
        }
        if self.note_key.is_none() {
            self.note_key = field("note_key");
        }
        if self.created_at.is_none() {
            self.created_at = field("created_at");
        }
    }
}

/// Knobs for a run.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Run version reconciliation after draft-save
    pub verify_version: bool,
    pub cover_policy: CoverUploadPolicy,
    /// Public site used to build the article URL
    pub site_url: String,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            verify_version: true,
            cover_policy: CoverUploadPolicy::default(),
            site_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// A successfully drafted (and possibly published) article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArticle {
    pub id: String,
    pub key: String,
    /// False when an existing `note_id` was updated
    pub created_new: bool,
    pub published: bool,
    pub eyecatch_url: Option<String>,
    pub url: String,
}

/// Outcome of a run plus everything that happened along the way.
#[derive(Debug)]
pub struct PublishReport {
    pub outcome: Result<PublishedArticle>,
    pub events: EventLog,
    pub final_state: PublishState,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

struct RunState {
    step: Step,
    state: PublishState,
    events: EventLog,
}

/// Drives the publishing workflow against a [`NoteApi`].
pub struct Publisher<A, U> {
    api: A,
    auth: U,
    options: PublishOptions,
}

impl<A, U> Publisher<A, U>
where
    A: NoteApi,
    U: Authenticator,
{
    pub fn new(api: A, auth: U) -> Self {
        Self {
            api,
            auth,
            options: PublishOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Publish `document`. Never panics on platform errors; inspect the
    /// report's `outcome` instead.
    pub async fn run(&self, document: &Document, credentials: &Credentials) -> PublishReport {
        let mut run = RunState {
            step: Step::Login,
            state: PublishState::Unauthenticated,
            events: EventLog::new(),
        };

        let outcome = self.execute(document, credentials, &mut run).await;

        if let Err(e) = &outcome {
            run.events.error(run.step, e.to_string());
            run.state = PublishState::Failed;
        }

        PublishReport {
            outcome,
            events: run.events,
            final_state: run.state,
        }
    }

    async fn execute(
        &self,
        document: &Document,
        credentials: &Credentials,
        run: &mut RunState,
    ) -> Result<PublishedArticle> {
        run.step = Step::Login;
        let session = self.auth.login(credentials).await?;
        if session.is_empty() {
            return Err(PublishError::AuthFailure {
                reason: "no session cookies were returned".to_string(),
            });
        }
        run.events
            .info(Step::Login, format!("logged in ({} cookies)", session.len()));
        run.state = PublishState::Authenticated;

        run.step = Step::InlineImages;
        let images = process_inline_images(&self.api, &session, &document.body).await;
        run.events.append(images.events);

        run.step = Step::Article;
        let (mut handle, created_new) = match &document.note_id {
            Some(id) => (self.fetch_article(&session, id, &mut run.events).await?, false),
            None => {
                let handle = self
                    .create_article(&session, &document.title, &images.markdown)
                    .await?;
                (handle, true)
            }
        };
        run.events.info(
            Step::Article,
            format!(
                "{} article id={} key={}",
                if created_new { "created" } else { "editing" },
                handle.id,
                handle.key
            ),
        );
        run.state = PublishState::Drafted {
            id: handle.id.clone(),
            key: handle.key.clone(),
        };

        run.step = Step::DraftSave;
        let content = DraftContent::new(
            handle.id.clone(),
            handle.key.clone(),
            document.title.clone(),
            images.markdown,
            images.uploaded_keys,
        );
        let saved = self.save_draft(&session, &content, &mut run.events).await?;
        if let Some(data) = saved.data() {
            handle.absorb(&data);
        }

        if self.options.verify_version {
            run.step = Step::Reconcile;
            reconcile_version(&self.api, &session, &mut handle, &mut run.events).await;
        }

        let mut eyecatch_url = None;
        if let Some(source) = &document.eyecatch_url {
            run.step = Step::CoverImage;
            match upload_cover_image(
                &self.api,
                &session,
                &handle.id,
                source,
                &self.options.cover_policy,
                &mut run.events,
            )
            .await
            {
                Ok(url) => {
                    run.events.info(
                        Step::CoverImage,
                        format!("cover image set: {}", url.as_deref().unwrap_or("(no url)")),
                    );
                    eyecatch_url = url;
                }
                Err(e) => run
                    .events
                    .warn(Step::CoverImage, format!("cover image not set: {}", e)),
            }
        }

        let mut published = false;
        if document.publish {
            run.step = Step::Publish;
            self.publish(&session, &content, &document.hashtags).await?;
            run.events.info(Step::Publish, "article published");
            run.state = PublishState::Published;
            published = true;
        }

        let url = format!(
            "{}/notes/{}",
            self.options.site_url.trim_end_matches('/'),
            handle.key
        );
        info!(id = %handle.id, key = %handle.key, published, "Run finished");

        Ok(PublishedArticle {
            id: handle.id,
            key: handle.key,
            created_new,
            published,
            eyecatch_url,
            url,
        })
    }

    async fn create_article(
        &self,
        session: &Session,
        title: &str,
        markdown: &str,
    ) -> Result<ArticleHandle> {
        let payload = json!({
            "name": title,
            "body": render_html(markdown),
        });
        let resp = self
            .api
            .create_text_note(session, &payload)
            .await
            .map_err(|e| PublishError::from_client("create_article", e))?;

        if !resp.is_accepted() {
            return Err(PublishError::rejected("create_article", &resp));
        }
        resp.data()
            .as_ref()
            .and_then(ArticleHandle::from_data)
            .ok_or_else(|| PublishError::UpstreamRejected {
                step: "create_article",
                status: resp.status,
                body: format!("response lacks data.id/data.key: {}", resp.truncated_body()),
            })
    }

    async fn fetch_article(
        &self,
        session: &Session,
        id: &str,
        events: &mut EventLog,
    ) -> Result<ArticleHandle> {
        let resp = self
            .api
            .get_text_note(session, id)
            .await
            .map_err(|e| PublishError::from_client("fetch_article", e))?;

        match resp.status {
            404 => Err(PublishError::NotFound { id: id.to_string() }),
            405 => {
                events.info(
                    Step::Article,
                    format!("existence check for {} answered 405, continuing", id),
                );
                Ok(ArticleHandle::new(id, id))
            }
            _ if resp.is_accepted() => {
                let data = resp.data().unwrap_or(Value::Null);
                let key = data
                    .get("key")
                    .and_then(value_to_string)
                    .unwrap_or_else(|| id.to_string());
                let mut handle = ArticleHandle::new(id, key);
                handle.absorb(&data);
                Ok(handle)
            }
            _ => Err(PublishError::rejected("fetch_article", &resp)),
        }
    }

    /// Try each payload variant until one is accepted.
    async fn save_draft(
        &self,
        session: &Session,
        content: &DraftContent,
        events: &mut EventLog,
    ) -> Result<ApiResponse> {
        let mut last: Option<ApiResponse> = None;

        for (n, variant) in DRAFT_SAVE_VARIANTS.iter().enumerate() {
            let payload = (variant.build)(content);
            let resp = self
                .api
                .draft_save(session, &content.id, &payload)
                .await
                .map_err(|e| PublishError::from_client("draft_save", e))?;

            if resp.is_accepted() {
                events.info(
                    Step::DraftSave,
                    format!("draft saved (variant {} \"{}\")", n + 1, variant.name),
                );
                return Ok(resp);
            }

            events.debug(
                Step::DraftSave,
                format!(
                    "variant {} \"{}\" rejected with {}",
                    n + 1,
                    variant.name,
                    resp.status
                ),
            );
            last = Some(resp);
        }

        Err(match last {
            Some(resp) => PublishError::rejected("draft_save", &resp),
            None => PublishError::UpstreamRejected {
                step: "draft_save",
                status: 0,
                body: "no payload variants".to_string(),
            },
        })
    }

    async fn publish(
        &self,
        session: &Session,
        content: &DraftContent,
        hashtags: &[String],
    ) -> Result<()> {
        let payload = publish_payload(content, hashtags);
        let resp = self
            .api
            .update_text_note(session, &content.id, &payload)
            .await
            .map_err(|e| PublishError::from_client("publish", e))?;

        if resp.is_accepted() {
            Ok(())
        } else {
            Err(PublishError::rejected("publish", &resp))
        }
    }
}
