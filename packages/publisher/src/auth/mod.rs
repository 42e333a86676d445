//! Authentication: turn account credentials into a platform [`Session`].
//!
//! The orchestrator only depends on the [`Authenticator`] trait, so tests
//! can substitute a canned session (see [`crate::testing::StubAuthenticator`])
//! and the browser-driven implementation stays behind the `browser` feature.

#[cfg(feature = "browser")]
pub mod browser;

#[cfg(feature = "browser")]
pub use browser::BrowserAuthenticator;

use async_trait::async_trait;
use note_client::Session;
use std::fmt;

use crate::error::Result;

/// Account email and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Produces an authenticated session.
///
/// Implementations may return an empty session instead of an error when the
/// login form could not be completed; callers treat both as a login failure.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Session>;
}
