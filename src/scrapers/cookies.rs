//! Session cookies for authenticated history pages.
//!
//! Cookies come from a JSON export (`[{name, value, domain}]`, `key` accepted
//! for `name`) or a raw `Cookie` header string. Both the HTTP client jar and
//! the browser page are seeded from the same entries.

use std::path::Path;

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::HarvestConfig;
use crate::history::HarvestError;

/// One cookie from an export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    #[serde(default, alias = "key")]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieEntry {
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: default_path(),
        }
    }

    fn is_usable(&self) -> bool {
        !self.name.is_empty() && !self.domain.is_empty()
    }

    /// `Set-Cookie` style string for a cookie jar.
    pub fn to_set_cookie(&self) -> String {
        format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        )
    }

    /// URL the cookie is scoped to, used when seeding a jar.
    pub fn scope_url(&self) -> Option<Url> {
        let host = self.domain.trim_start_matches('.');
        Url::parse(&format!("https://{}{}", host, self.path)).ok()
    }
}

/// Parse a JSON cookie export. Entries without a name or domain are skipped.
pub fn parse_cookie_json(content: &str) -> Result<Vec<CookieEntry>, HarvestError> {
    let entries: Vec<CookieEntry> = serde_json::from_str(content)
        .map_err(|e| HarvestError::Config(format!("Invalid cookie file: {}", e)))?;
    Ok(entries.into_iter().filter(CookieEntry::is_usable).collect())
}

/// Read a JSON cookie export from disk.
pub async fn read_cookie_file(path: &Path) -> Result<Vec<CookieEntry>, HarvestError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        HarvestError::Config(format!("Failed to read cookie file {}: {}", path.display(), e))
    })?;
    let cookies = parse_cookie_json(&content)?;
    debug!("Loaded {} cookies from {}", cookies.len(), path.display());
    Ok(cookies)
}

/// Split a raw `Cookie` header (`a=1; b=2`) into entries for `domain`.
pub fn parse_cookie_header(raw: &str, domain: &str) -> Vec<CookieEntry> {
    raw.split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| CookieEntry::new(name.trim(), value.trim(), domain))
        .filter(CookieEntry::is_usable)
        .collect()
}

/// All configured cookies for `target`: the export file (if any) plus the
/// raw cookie header scoped to the target host.
pub async fn session_cookies(
    config: &HarvestConfig,
    target: &Url,
) -> Result<Vec<CookieEntry>, HarvestError> {
    let mut cookies = match config.cookies_file() {
        Some(path) => read_cookie_file(&path).await?,
        None => Vec::new(),
    };
    if let (Some(raw), Some(host)) = (&config.http.cookie, target.host_str()) {
        cookies.extend(parse_cookie_header(raw, host));
    }
    Ok(cookies)
}

/// Cookie jar seeded with `cookies`. Each cookie is added under its own
/// domain, falling back to `target` when that domain isn't a valid host.
pub fn build_jar(cookies: &[CookieEntry], target: &Url) -> Jar {
    let jar = Jar::default();
    for cookie in cookies {
        let url = cookie.scope_url().unwrap_or_else(|| target.clone());
        jar.add_cookie_str(&cookie.to_set_cookie(), &url);
    }
    jar
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    #[test]
    fn parses_export_with_key_alias() {
        let json = r#"[
            {"name": "session", "value": "abc", "domain": ".example.com"},
            {"key": "csrftoken", "value": "xyz", "domain": "example.com", "path": "/profile"},
            {"name": "orphan", "value": "1"}
        ]"#;
        let cookies = parse_cookie_json(json).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].path, "/");
        assert_eq!(cookies[1].name, "csrftoken");
        assert_eq!(cookies[1].path, "/profile");
    }

    #[test]
    fn invalid_export_is_config_error() {
        let err = parse_cookie_json("{not json").unwrap_err();
        assert_eq!(err.kind(), "Config");
    }

    #[test]
    fn header_string_split_into_pairs() {
        let cookies = parse_cookie_header("session=abc; theme = dark ;broken", "example.com");
        assert_eq!(
            cookies,
            vec![
                CookieEntry::new("session", "abc", "example.com"),
                CookieEntry::new("theme", "dark", "example.com"),
            ]
        );
    }

    #[test]
    fn jar_sends_cookies_to_matching_host() {
        let target = Url::parse("https://example.com/profile/history").unwrap();
        let jar = build_jar(&[CookieEntry::new("session", "abc", ".example.com")], &target);

        let header = jar.cookies(&target).unwrap();
        assert_eq!(header.to_str().unwrap(), "session=abc");

        let other = Url::parse("https://other.org/").unwrap();
        assert!(jar.cookies(&other).is_none());
    }
}
