//! HTTP page fetcher carrying the user's session cookies.

mod user_agent;

pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::cookies::{build_jar, session_cookies, CookieEntry};
use crate::config::{HarvestConfig, HttpConfig};
use crate::history::HarvestError;
use crate::loader::{FetchError, PageFetcher};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Cookie-aware HTTP client for history pages.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Build a client whose jar holds `cookies`.
    pub fn new(
        config: &HttpConfig,
        cookies: &[CookieEntry],
        target: &Url,
    ) -> Result<Self, HarvestError> {
        let user_agent = resolve_user_agent(config.user_agent.as_deref());
        let jar = build_jar(cookies, target);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(config.timeout())
            .cookie_provider(Arc::new(jar))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, user_agent })
    }

    /// Build a client for `target` from the cookie file and raw cookie
    /// header in `config`.
    pub async fn for_target(config: &HarvestConfig, target: &Url) -> Result<Self, HarvestError> {
        let cookies = session_cookies(config, target).await?;
        debug!("HTTP client for {} with {} cookies", target, cookies.len());
        Self::new(&config.http, &cookies, target)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET a page as text. Non-success statuses are errors.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static(ACCEPT_HTML))
            .send()
            .await?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}
