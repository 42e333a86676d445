//! Authenticated session state.
//!
//! A [`Session`] is the cookie jar produced by logging in. It is created once
//! per run and only read afterwards.

use std::collections::BTreeMap;

/// Cookie names the platform has used for its CSRF token, in lookup order.
const CSRF_COOKIE_NAMES: [&str; 4] = ["csrf_token", "_csrf_token", "XSRF-TOKEN", "xsrf-token"];

/// Cookie jar for an authenticated note.com session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: BTreeMap<String, String>,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session from name/value pairs.
    pub fn from_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add or replace a cookie (builder pattern).
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// True when login produced no cookies.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// First non-empty CSRF token found among the known cookie names.
    pub fn csrf_token(&self) -> Option<&str> {
        CSRF_COOKIE_NAMES
            .iter()
            .filter_map(|name| self.get(name))
            .find(|value| !value.is_empty())
    }

    /// Value for a `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_token_lookup_order() {
        let session = Session::new()
            .with_cookie("XSRF-TOKEN", "third")
            .with_cookie("_csrf_token", "second");
        assert_eq!(session.csrf_token(), Some("second"));

        let session = session.with_cookie("csrf_token", "first");
        assert_eq!(session.csrf_token(), Some("first"));
    }

    #[test]
    fn test_csrf_token_skips_empty_values() {
        let session = Session::from_cookies([("csrf_token", ""), ("xsrf-token", "tok")]);
        assert_eq!(session.csrf_token(), Some("tok"));
    }

    #[test]
    fn test_no_csrf_token() {
        let session = Session::from_cookies([("_note_session_v5", "abc")]);
        assert_eq!(session.csrf_token(), None);
        assert!(!session.is_empty());
    }

    #[test]
    fn test_cookie_header() {
        let session = Session::from_cookies([("b", "2"), ("a", "1")]);
        assert_eq!(session.cookie_header(), "a=1; b=2");
        assert!(Session::new().cookie_header().is_empty());
    }
}
