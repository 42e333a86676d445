use anyhow::{Context, Result};
use dotenvy::dotenv;
use note_client::DEFAULT_BASE_URL;
use std::env;
use std::time::Duration;

use crate::auth::Credentials;

/// Publisher configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub note_email: String,
    pub note_password: String,
    pub base_url: String,
    pub http_timeout: Duration,
    pub show_browser: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            note_email: var_or_input("NOTE_EMAIL")
                .context("NOTE_EMAIL (or INPUT_NOTE_EMAIL) must be set")?,
            note_password: var_or_input("NOTE_PASSWORD")
                .context("NOTE_PASSWORD (or INPUT_NOTE_PASSWORD) must be set")?,
            base_url: env::var("NOTE_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(
                env::var("NOTE_HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("NOTE_HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            show_browser: env::var("NOTE_SHOW_BROWSER")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.note_email.clone(), self.note_password.clone())
    }
}

/// `NAME`, falling back to the GitHub Actions input form `INPUT_NAME`.
fn var_or_input(name: &str) -> Option<String> {
    non_blank(name).or_else(|| non_blank(&format!("INPUT_{}", name)))
}

/// A `.env` placeholder like `NOTE_EMAIL=` counts as unset.
fn non_blank(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_blank_variable_falls_back_to_input() {
        env::set_var("NOTE_CFG_BLANK", "");
        env::set_var("INPUT_NOTE_CFG_BLANK", "writer@example.com");
        assert_eq!(
            var_or_input("NOTE_CFG_BLANK").as_deref(),
            Some("writer@example.com")
        );
    }

    #[test]
    fn test_primary_variable_wins() {
        env::set_var("NOTE_CFG_BOTH", "primary@example.com");
        env::set_var("INPUT_NOTE_CFG_BOTH", "input@example.com");
        assert_eq!(
            var_or_input("NOTE_CFG_BOTH").as_deref(),
            Some("primary@example.com")
        );

        env::set_var("NOTE_CFG_NONE", " ");
        env::remove_var("INPUT_NOTE_CFG_NONE");
        assert_eq!(var_or_input("NOTE_CFG_NONE"), None);
    }
}
