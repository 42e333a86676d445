//! Publish markdown documents to note.com
//!
//! Logs in through a browser, uploads inline and cover images, creates or
//! updates the article, saves the draft and optionally publishes it. All
//! platform traffic goes through the [`note_client::NoteApi`] trait, so the
//! whole workflow runs against [`testing::MockNoteApi`] in tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use note_client::NoteClient;
//! use note_publisher::auth::{BrowserAuthenticator, Credentials};
//! use note_publisher::{Document, DocumentOverrides, Publisher};
//!
//! let document = Document::load("post.md".as_ref(), &DocumentOverrides::default())?;
//! let publisher = Publisher::new(NoteClient::new()?, BrowserAuthenticator::new());
//!
//! let report = publisher
//!     .run(&document, &Credentials::new("me@example.com", "secret"))
//!     .await;
//! for event in report.events.events() {
//!     println!("[{}] {}", event.step, event.message);
//! }
//! let article = report.outcome?;
//! println!("{}", article.url);
//! ```
//!
//! # Modules
//!
//! - [`markdown`] - Editor HTML rendering and body length
//! - [`images`] - Inline image re-hosting and cover upload
//! - [`orchestrator`] - The publishing workflow
//! - [`payloads`] - Draft-save and publish request bodies
//! - [`reconcile`] - Best-effort draft version verification
//! - [`auth`] - Login
//! - [`testing`] - Mock API and stub authenticator

pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod images;
pub mod markdown;
pub mod orchestrator;
pub mod payloads;
pub mod reconcile;
pub mod testing;

pub use auth::{Authenticator, Credentials};
pub use config::Config;
pub use document::{write_back_note_id, Document, DocumentError, DocumentOverrides};
pub use error::{PublishError, Result};
pub use events::{EventLevel, EventLog, PublishEvent, Step};
pub use orchestrator::{
    ArticleHandle, PublishOptions, PublishReport, PublishState, PublishedArticle, Publisher,
};
