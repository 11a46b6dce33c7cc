//! Pagination loader: walks `?page=N` URLs and merges every page.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::{HarvestContext, HistoryLoader, LoadReport, ProgressFn};
use crate::config::PaginationConfig;
use crate::history::locator::parse_static;
use crate::history::{extract_document, ExtractionMode, HarvestError};

static LINKS: LazyLock<Selector> = LazyLock::new(|| parse_static("a[href]"));
static PAGINATION: LazyLock<Selector> =
    LazyLock::new(|| parse_static(r#".pagination, .pager, nav, [role="navigation"]"#));

/// Errors from fetching a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Fetches page bodies with whatever credentials the session carries.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body. Non-success statuses are errors.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// URL of page `n`: the base URL with the page parameter set to `n`.
/// Other query pairs are preserved in order.
pub fn page_url(base: &Url, param: &str, n: u32) -> Url {
    let pairs: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        query.append_pair(param, &n.to_string());
    }
    url
}

/// The base URL without its page parameter, plus the page it pointed at.
pub fn strip_page_param(base: &Url, param: &str) -> (Url, Option<u32>) {
    let mut page = None;
    let pairs: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, v)| {
            if k == param {
                page = page.or_else(|| v.trim().parse::<u32>().ok());
                false
            } else {
                true
            }
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    (url, page)
}

fn in_pagination_block(link: ElementRef<'_>) -> bool {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| PAGINATION.matches(&ancestor))
}

/// Highest page number linked from the document, defaulting to 1.
///
/// Only links on the base URL's origin count, and of those only links to
/// the same path or links inside a pagination block (`.pagination`,
/// `.pager`, `nav`, `role="navigation"`).
pub fn discover_page_count(html: &str, base: &Url, param: &str) -> u32 {
    let document = Html::parse_document(html);
    document
        .select(&LINKS)
        .filter_map(|a| {
            let url = base.join(a.value().attr("href")?).ok()?;
            let same_listing = url.path() == base.path() || in_pagination_block(a);
            (url.origin() == base.origin() && same_listing).then_some(url)
        })
        .filter_map(|url| {
            url.query_pairs()
                .find(|(k, _)| k == param)
                .and_then(|(_, v)| v.trim().parse::<u32>().ok())
        })
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Loader walking numbered pages through a [`PageFetcher`].
pub struct PaginatedLoader {
    fetcher: Arc<dyn PageFetcher>,
    base_url: Url,
    /// Page named by the URL the loader was given, if any.
    start_page: Option<u32>,
    mode: ExtractionMode,
    config: PaginationConfig,
    initial_html: Option<String>,
    progress: Option<ProgressFn>,
}

impl PaginatedLoader {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        base_url: Url,
        mode: ExtractionMode,
        config: PaginationConfig,
    ) -> Self {
        let (base_url, start_page) = strip_page_param(&base_url, &config.page_param);
        Self {
            fetcher,
            base_url,
            start_page,
            mode,
            config,
            initial_html: None,
            progress: None,
        }
    }

    /// Use an already loaded page instead of fetching the base URL.
    ///
    /// The page is taken to be the one the base URL's page parameter names
    /// (page 1 without one).
    pub fn with_initial_html(mut self, html: String) -> Self {
        self.initial_html = Some(html);
        self
    }

    /// Report progress messages to `progress`.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, message: &str) {
        if let Some(progress) = &self.progress {
            progress(message);
        }
    }

    async fn fetch_page(&self, page: u32, url: &Url) -> Result<String, HarvestError> {
        debug!("Fetching page {}: {}", page, url);
        self.fetcher.fetch(url).await.map_err(|e| {
            warn!("Page {} failed: {}", page, e);
            HarvestError::page_fetch(page, e.to_string())
        })
    }
}

#[async_trait]
impl HistoryLoader for PaginatedLoader {
    fn name(&self) -> &str {
        "pagination"
    }

    async fn load(&self, context: &HarvestContext) -> Result<LoadReport, HarvestError> {
        let mut report = LoadReport::default();

        let (initial, initial_page) = match &self.initial_html {
            Some(html) => (html.clone(), self.start_page.unwrap_or(1)),
            None => {
                let html = self.fetch_page(1, &self.base_url).await?;
                report.pages_fetched += 1;
                (html, 1)
            }
        };

        let param = self.config.page_param.as_str();
        let discovered = discover_page_count(&initial, &self.base_url, param).max(initial_page);
        let total = discovered.min(self.config.max_pages.max(1));
        if total < discovered {
            warn!(
                "Found {} pages at {}, fetching only the first {}",
                discovered, self.base_url, total
            );
        } else {
            info!("Found {} pages at {}", total, self.base_url);
        }

        let batch = extract_document(&initial, self.mode);
        report.kind = Some(batch.kind);
        context.merge(batch)?;
        self.report(&format!("Page {}/{}: {} records", initial_page, total, context.len()));

        let remaining: Vec<u32> = (1..=total).filter(|p| *p != initial_page).collect();
        for (i, &page) in remaining.iter().enumerate() {
            if context.is_cancelled() {
                return Err(HarvestError::Superseded);
            }

            let url = page_url(&self.base_url, param, page);
            let body = self.fetch_page(page, &url).await?;
            report.pages_fetched += 1;

            // A fetch that resolves after a new operation began is ignored.
            let batch = extract_document(&body, self.mode);
            report.kind = Some(batch.kind);
            let added = context.merge(batch)?;
            debug!("Page {} added {} records", page, added);
            self.report(&format!("Page {}/{}: {} records", page, total, context.len()));

            if i + 1 < remaining.len() {
                tokio::time::sleep(self.config.page_delay()).await;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/profile/history?sort=desc").unwrap()
    }

    #[test]
    fn page_url_sets_param_and_keeps_others() {
        let url = page_url(&base(), "page", 3);
        assert_eq!(url.as_str(), "https://example.com/profile/history?sort=desc&page=3");

        let paged = Url::parse("https://example.com/h?page=2&sort=desc").unwrap();
        assert_eq!(page_url(&paged, "page", 5).as_str(), "https://example.com/h?sort=desc&page=5");
    }

    #[test]
    fn discovers_highest_linked_page() {
        let html = r#"<nav class="pagination">
            <a href="?page=2">2</a><a href="?page=3">3</a>
            <a href="/profile/history?page=12&sort=desc">Last</a>
            <a href="?page=next">Next</a><a href="/about">About</a>
        </nav>"#;
        assert_eq!(discover_page_count(html, &base(), "page"), 12);
    }

    #[test]
    fn missing_pagination_means_one_page() {
        assert_eq!(discover_page_count("<p>no links</p>", &base(), "page"), 1);
        assert_eq!(
            discover_page_count(r#"<a href="?p=4">4</a>"#, &base(), "page"),
            1
        );
    }

    #[test]
    fn ignores_page_links_to_other_listings() {
        let html = r#"<nav class="pagination"><a href="?page=2">2</a></nav>
            <aside>
              <a href="https://forum.example.org/threads?page=400">Forum</a>
              <a href="/news?page=37">News</a>
            </aside>"#;
        assert_eq!(discover_page_count(html, &base(), "page"), 2);
    }

    #[test]
    fn pagination_block_may_use_another_path() {
        let html = r#"<div class="pager"><a href="/profile/history/all?page=6">6</a></div>"#;
        assert_eq!(discover_page_count(html, &base(), "page"), 6);
    }

    #[test]
    fn strips_page_param_from_base() {
        let url = Url::parse("https://example.com/h?page=3&sort=desc").unwrap();
        let (stripped, page) = strip_page_param(&url, "page");
        assert_eq!(stripped.as_str(), "https://example.com/h?sort=desc");
        assert_eq!(page, Some(3));

        let url = Url::parse("https://example.com/h?page=3").unwrap();
        let (stripped, _) = strip_page_param(&url, "page");
        assert_eq!(stripped.as_str(), "https://example.com/h");
        assert_eq!(strip_page_param(&base(), "page").1, None);
    }
}
