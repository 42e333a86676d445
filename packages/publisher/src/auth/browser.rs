//! Browser-driven login using headless Chrome.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use note_client::{Session, DEFAULT_BASE_URL};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::{Authenticator, Credentials};
use crate::error::{PublishError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

/// Link or button that switches the login page to the email form.
const EMAIL_LOGIN_ENTRY: &[Locator] = &[
    Locator::XPath("//a[contains(., 'メールアドレス') and contains(., 'ログイン')]"),
    Locator::XPath("//button[contains(., 'メールアドレス') and contains(., 'ログイン')]"),
    Locator::XPath("//a[contains(., 'メールアドレスでログイン')]"),
    Locator::XPath("//button[contains(., 'メールアドレスでログイン')]"),
];

const EMAIL_INPUT: &[Locator] = &[
    Locator::Css("input[name='email']"),
    Locator::Css("input[name='login']"),
    Locator::Css("input[type='email']"),
    Locator::Css("input[autocomplete='username']"),
    Locator::XPath("//input[contains(@placeholder, 'メール')]"),
];

const PASSWORD_INPUT: &[Locator] = &[
    Locator::Css("input[name='password']"),
    Locator::Css("input[type='password']"),
    Locator::Css("input[autocomplete='current-password']"),
    Locator::XPath("//input[contains(@placeholder, 'パスワード')]"),
];

const SUBMIT_BUTTON: &[Locator] = &[
    Locator::Css("button[type='submit']"),
    Locator::XPath("//button[contains(., 'ログイン')]"),
    Locator::XPath("//button[contains(., 'Sign in')]"),
    Locator::Css("input[type='submit']"),
];

/// Logs in through the platform's web login form and returns its cookies.
pub struct BrowserAuthenticator {
    base_url: String,
    show_browser: bool,
    element_timeout: Duration,
    settle_delay: Duration,
}

impl BrowserAuthenticator {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            show_browser: false,
            element_timeout: Duration::from_secs(20),
            settle_delay: Duration::from_secs(2),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Run Chrome with a visible window.
    pub fn show_browser(mut self, show: bool) -> Self {
        self.show_browser = show;
        self
    }

    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    async fn launch(&self) -> Result<(Browser, tokio::task::JoinHandle<()>)> {
        let mut builder = BrowserConfig::builder();
        if self.show_browser {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|reason| PublishError::AuthFailure { reason })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            warn!(error = %e, "Failed to launch browser");
            PublishError::AuthFailure {
                reason: format!("browser launch failed: {}", e),
            }
        })?;

        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok((browser, driver))
    }

    /// Fill and submit the login form. `None` when an element is missing.
    async fn submit_login(&self, page: &Page, credentials: &Credentials) -> Option<()> {
        // The email form is sometimes behind an extra click.
        if let Some(entry) = find_first(page, EMAIL_LOGIN_ENTRY).await {
            debug!("Switching to email login form");
            entry.click().await.ok()?;
        }

        let email = self.wait_for(page, EMAIL_INPUT, "email input").await?;
        let password = self.wait_for(page, PASSWORD_INPUT, "password input").await?;

        email.click().await.ok()?.type_str(&credentials.email).await.ok()?;
        password
            .click()
            .await
            .ok()?
            .type_str(&credentials.password)
            .await
            .ok()?;

        let submit = self.wait_for(page, SUBMIT_BUTTON, "login button").await?;
        submit.click().await.ok()?;
        Some(())
    }

    async fn wait_for(&self, page: &Page, locators: &[Locator], what: &str) -> Option<Element> {
        let deadline = Instant::now() + self.element_timeout;
        loop {
            if let Some(element) = find_first(page, locators).await {
                return Some(element);
            }
            if Instant::now() >= deadline {
                warn!(element = what, "Login form element not found");
                return None;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_until_logged_in(&self, page: &Page) -> bool {
        let deadline = Instant::now() + self.element_timeout;
        loop {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if !url.is_empty() && !url.contains("/login") {
                debug!(url = %url, "Left login page");
                return true;
            }
            if Instant::now() >= deadline {
                warn!(url = %url, "Still on login page");
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn collect_session(&self, page: &Page, credentials: &Credentials) -> Result<Session> {
        if self.submit_login(page, credentials).await.is_none() {
            return Ok(Session::new());
        }
        if !self.wait_until_logged_in(page).await {
            return Ok(Session::new());
        }
        sleep(self.settle_delay).await;

        let cookies = page.get_cookies().await.map_err(|e| PublishError::AuthFailure {
            reason: format!("could not read cookies: {}", e),
        })?;
        Ok(Session::from_cookies(
            cookies.into_iter().map(|c| (c.name, c.value)),
        ))
    }
}

impl Default for BrowserAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for BrowserAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let login_url = format!("{}/login", self.base_url);
        info!(url = %login_url, headless = !self.show_browser, "Logging in");

        let (mut browser, driver) = self.launch().await?;

        let result = match browser.new_page(login_url.as_str()).await {
            Ok(page) => self.collect_session(&page, credentials).await,
            Err(e) => Err(PublishError::AuthFailure {
                reason: format!("could not open login page: {}", e),
            }),
        };

        if let Err(e) = browser.close().await {
            debug!(error = %e, "Browser close failed");
        }
        let _ = browser.wait().await;
        driver.abort();

        if let Ok(session) = &result {
            info!(cookies = session.len(), "Login finished");
        }
        result
    }
}

async fn find_first(page: &Page, locators: &[Locator]) -> Option<Element> {
    for locator in locators {
        let found = match locator {
            Locator::Css(selector) => page.find_element(*selector).await,
            Locator::XPath(path) => page.find_xpath(*path).await,
        };
        if let Ok(element) = found {
            return Some(element);
        }
    }
    None
}
