//! Browser session for pages that only reveal history through interaction.
//!
//! Uses chromiumoxide (CDP) to launch a local Chrome or attach to a remote
//! one, seeds the session cookies and hands the navigated page to the
//! interaction loader as a [`LivePage`](crate::loader::LivePage).

mod config;
#[cfg(feature = "browser")]
mod page;

pub use config::BrowserConfig;
#[cfg(feature = "browser")]
pub use page::ChromiumPage;

use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig as ChromeConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use super::cookies::CookieEntry;
use crate::history::HarvestError;
use crate::loader::LivePage;

#[cfg(feature = "browser")]
fn browser_error(context: &str, e: impl std::fmt::Display) -> HarvestError {
    HarvestError::Browser(format!("{}: {}", context, e))
}

/// JavaScript resolving once the document is interactive.
#[cfg(feature = "browser")]
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// A launched or attached browser.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    config: BrowserConfig,
    browser: Option<Arc<Mutex<Browser>>>,
    remote: bool,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: None,
            remote: false,
        }
    }

    fn find_chrome() -> Result<std::path::PathBuf, HarvestError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &["google-chrome", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(HarvestError::Browser(
            "Chrome/Chromium not found; install it or set BROWSER_URL to a running instance"
                .to_string(),
        ))
    }

    /// Launch or connect to the browser if not already running.
    pub async fn ensure_browser(&mut self) -> Result<(), HarvestError> {
        if self.browser.is_some() {
            return Ok(());
        }

        if let Some(remote_url) = self.config.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);
        let mut builder = ChromeConfig::builder().chrome_executable(Self::find_chrome()?);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| browser_error("Failed to build browser config", e))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_error("Failed to launch browser", e))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(Arc::new(Mutex::new(browser)));
        self.remote = false;
        Ok(())
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&mut self, url: &str) -> Result<(), HarvestError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| browser_error("Failed to reach remote browser", e))?
            .json()
            .await
            .map_err(|e| browser_error("Failed to parse browser version info", e))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HarvestError::Browser("No webSocketDebuggerUrl in response".into()))?;
        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };
        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| browser_error("Failed to connect to remote browser", e))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(Arc::new(Mutex::new(browser)));
        self.remote = true;
        Ok(())
    }

    /// Open `url` in a new tab with `cookies` set, wait for it to be ready
    /// and return it as a live page.
    pub async fn open(
        &mut self,
        url: &str,
        cookies: &[CookieEntry],
    ) -> Result<Arc<dyn LivePage>, HarvestError> {
        self.ensure_browser().await?;
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| HarvestError::Browser("browser not initialized".into()))?
            .lock()
            .await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_error("Failed to open tab", e))?;
        drop(browser);

        if let Some(ref agent) = self.config.user_agent {
            page.execute(SetUserAgentOverrideParams::new(agent.clone()))
                .await
                .map_err(|e| browser_error("Failed to set user agent", e))?;
        }
        set_cookies(&page, cookies).await;
        self.navigate(&page, url).await?;
        self.wait_until_ready(&page).await;

        Ok(Arc::new(ChromiumPage::new(
            page,
            Duration::from_millis(self.config.change_poll_ms),
        )))
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<(), HarvestError> {
        info!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| browser_error("Invalid URL", e))?;

        let timeout = Duration::from_secs(self.config.timeout);
        tokio::time::timeout(timeout, page.execute(params))
            .await
            .map_err(|_| {
                HarvestError::Browser(format!(
                    "Navigation timed out after {}s for {}",
                    self.config.timeout, url
                ))
            })?
            .map_err(|e| browser_error("Navigation failed", e))?;
        Ok(())
    }

    async fn wait_until_ready(&self, page: &Page) {
        let timeout = Duration::from_secs(self.config.timeout);
        match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string())).await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }

        if let Some(ref selector) = self.config.wait_for_selector {
            debug!("Waiting for selector: {}", selector);
            match tokio::time::timeout(timeout, page.find_element(selector.as_str())).await {
                Ok(Ok(_)) => debug!("Selector found"),
                Ok(Err(e)) => warn!("Selector not found: {}", e),
                Err(_) => warn!("Timeout waiting for selector {}", selector),
            }
        }
    }

    /// Close a launched browser; a remote one is only detached from.
    pub async fn close(&mut self) {
        if let Some(browser) = self.browser.take() {
            if !self.remote {
                let mut browser = browser.lock().await;
                if let Err(e) = browser.close().await {
                    debug!("Browser close failed: {}", e);
                }
            }
        }
    }
}

/// Set cookies on the page before navigation. Failures are logged, not fatal.
#[cfg(feature = "browser")]
async fn set_cookies(page: &Page, cookies: &[CookieEntry]) {
    for cookie in cookies {
        let param = CookieParam::builder()
            .name(cookie.name.clone())
            .value(cookie.value.clone())
            .domain(cookie.domain.clone())
            .path(cookie.path.clone())
            .build();
        match param {
            Ok(param) => {
                if let Err(e) = page.set_cookie(param).await {
                    warn!("Failed to set cookie {}: {}", cookie.name, e);
                }
            }
            Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
        }
    }
    debug!("Set {} cookies on page", cookies.len());
}

// Stub for when the browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    config: BrowserConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub async fn open(
        &mut self,
        _url: &str,
        _cookies: &[CookieEntry],
    ) -> Result<Arc<dyn LivePage>, HarvestError> {
        Err(HarvestError::Browser(format!(
            "Browser support not compiled (headless={}). Rebuild with: cargo build --features browser",
            self.config.headless
        )))
    }

    pub async fn close(&mut self) {}
}
