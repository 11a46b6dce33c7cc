//! Configuration for gemharvest.
//!
//! Layers, lowest to highest priority:
//! - built-in defaults
//! - a TOML file (`--config`, else `gemharvest.toml` in the working directory)
//! - environment variables (`GEMHARVEST_*`, `BROWSER_URL`)
//! - command-line flags, applied by the CLI

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::history::{ExtractionMode, HarvestError};
use crate::scrapers::browser::BrowserConfig;

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "gemharvest.toml";

/// Labels of controls that reveal more history.
pub const DEFAULT_LOAD_MORE_LABELS: [&str; 4] = ["Load more", "Show more", "More", "View more"];

/// Tunables of the interaction loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Polls while waiting for the first rows.
    pub initial_attempts: u32,
    pub initial_delay_ms: u64,
    /// Bound on each round's wait for new rows.
    pub growth_timeout_ms: u64,
    /// Pause after scrolling.
    pub scroll_settle_ms: u64,
    /// Consecutive rounds without growth or clicks before stopping.
    pub idle_rounds: u32,
    pub max_rounds: u32,
    /// Smallest scrollable extent (px) that makes an element the scroll target.
    pub min_scroll_extent: u64,
    pub load_more_labels: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            initial_attempts: 40,
            initial_delay_ms: 250,
            growth_timeout_ms: 2000,
            scroll_settle_ms: 300,
            idle_rounds: 3,
            max_rounds: 60,
            min_scroll_extent: 200,
            load_more_labels: DEFAULT_LOAD_MORE_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl LoaderConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn growth_timeout(&self) -> Duration {
        Duration::from_millis(self.growth_timeout_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

/// Tunables of the pagination loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    /// Query parameter carrying the page number.
    pub page_param: String,
    /// Delay between page fetches.
    pub page_delay_ms: u64,
    /// Upper bound on the discovered page count.
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            page_delay_ms: 500,
            max_pages: 200,
        }
    }
}

impl PaginationConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// `None` for the crate user agent, `"impersonate"` for a browser one,
    /// anything else is sent verbatim.
    pub user_agent: Option<String>,
    pub timeout_secs: u64,
    /// JSON cookie export (`[{name, value, domain}]`).
    pub cookies_file: Option<PathBuf>,
    /// Raw `Cookie` header value.
    pub cookie: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: 30,
            cookies_file: None,
            cookie: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarvestConfig {
    pub mode: ExtractionMode,
    pub loader: LoaderConfig,
    pub pagination: PaginationConfig,
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    /// File this config was read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl HarvestConfig {
    /// Load from `path`, or from `gemharvest.toml` in the working directory
    /// when present, then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self, HarvestError> {
        let config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILENAME);
                if local.is_file() {
                    Self::load_from_path(&local).await?
                } else {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            }
        };
        Ok(config.with_env_overrides())
    }

    /// Parse a TOML config file.
    pub async fn load_from_path(path: &Path) -> Result<Self, HarvestError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            HarvestError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|e| {
            HarvestError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply process environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("GEMHARVEST_COOKIES_FILE") {
            self.http.cookies_file = Some(PathBuf::from(path));
        }
        if let Some(cookie) = var("GEMHARVEST_COOKIE") {
            self.http.cookie = Some(cookie);
        }
        if let Some(agent) = var("GEMHARVEST_USER_AGENT") {
            self.http.user_agent = Some(agent);
        }
        if let Some(url) = var("BROWSER_URL") {
            self.browser.remote_url = Some(url);
        }
        self
    }

    /// Resolve a path from the config file against the file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        self.source_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(|dir| dir.join(path))
            .unwrap_or_else(|| path.to_path_buf())
    }

    /// Cookie file for both HTTP and browser sessions, resolved.
    pub fn cookies_file(&self) -> Option<PathBuf> {
        self.http
            .cookies_file
            .as_ref()
            .or(self.browser.cookies_file.as_ref())
            .map(|p| self.resolve_path(p))
    }
}
