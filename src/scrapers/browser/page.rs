//! chromiumoxide page exposed as a live document.
//!
//! Controls and scroll candidates are tagged with data attributes by the
//! listing scripts so the follow-up click or scroll hits the same element
//! even if the tree shifted in between. Change notification is a
//! MutationObserver counter on `document.body`, polled into a watch channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::history::HarvestError;
use crate::loader::live::{matches_load_more, ChangeFeed, ChangeSubscription};
use crate::loader::{LivePage, ScrollCandidate, ScrollTarget};

const LIST_CONTROLS_SCRIPT: &str = r#"
    document.querySelectorAll('[data-gemharvest-control]')
        .forEach((el) => el.removeAttribute('data-gemharvest-control'));
    Array.from(document.querySelectorAll('button, a')).map((el, i) => {
        el.setAttribute('data-gemharvest-control', String(i));
        return {
            index: i,
            text: (el.textContent || '').trim(),
            disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true'
        };
    })
"#;

const LIST_SCROLLABLES_SCRIPT: &str = r#"
    document.querySelectorAll('[data-gemharvest-scroll]')
        .forEach((el) => el.removeAttribute('data-gemharvest-scroll'));
    Array.from(document.querySelectorAll('body *'))
        .filter((el) => el.scrollHeight > el.clientHeight)
        .map((el, i) => {
            el.setAttribute('data-gemharvest-scroll', String(i));
            return {
                index: i,
                overflowY: getComputedStyle(el).overflowY,
                scrollHeight: el.scrollHeight,
                clientHeight: el.clientHeight
            };
        })
"#;

const SCROLL_PAGE_SCRIPT: &str =
    "window.scrollTo(0, document.documentElement.scrollHeight || document.body.scrollHeight); true";

const OBSERVE_SCRIPT: &str = r#"
    (() => {
        if (!window.__gemharvestObserver && document.body) {
            window.__gemharvestChanges = window.__gemharvestChanges || 0;
            window.__gemharvestObserver = new MutationObserver(() => { window.__gemharvestChanges += 1; });
            window.__gemharvestObserver.observe(document.body, { childList: true, subtree: true });
        }
        return window.__gemharvestChanges || 0;
    })()
"#;

const CHANGE_COUNT_SCRIPT: &str = "window.__gemharvestChanges || 0";

const DISCONNECT_SCRIPT: &str = r#"
    (() => {
        if (window.__gemharvestObserver) {
            window.__gemharvestObserver.disconnect();
            window.__gemharvestObserver = null;
        }
        return true;
    })()
"#;

#[derive(Debug, Deserialize)]
struct Control {
    index: usize,
    text: String,
    disabled: bool,
}

/// A navigated browser tab.
pub struct ChromiumPage {
    page: Page,
    poll_interval: Duration,
}

impl ChromiumPage {
    pub fn new(page: Page, poll_interval: Duration) -> Self {
        Self {
            page,
            poll_interval,
        }
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, HarvestError> {
        evaluate(&self.page, script).await
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, script: &str) -> Result<T, HarvestError> {
    page.evaluate(script.to_string())
        .await
        .map_err(|e| HarvestError::Browser(format!("Script failed: {}", e)))?
        .into_value()
        .map_err(|e| HarvestError::Browser(format!("Unexpected script result: {}", e)))
}

#[async_trait]
impl LivePage for ChromiumPage {
    async fn snapshot(&self) -> Result<String, HarvestError> {
        self.page
            .content()
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to read page: {}", e)))
    }

    async fn activate_load_more(&self, labels: &[String]) -> Result<bool, HarvestError> {
        let controls: Vec<Control> = self.eval(LIST_CONTROLS_SCRIPT).await?;
        let targets: Vec<usize> = controls
            .iter()
            .filter(|c| !c.disabled && matches_load_more(&c.text, labels))
            .map(|c| c.index)
            .collect();
        if targets.is_empty() {
            return Ok(false);
        }

        debug!("Clicking {} load-more controls", targets.len());
        let script = format!(
            "{}.forEach((i) => {{ const el = document.querySelector('[data-gemharvest-control=\"' + i + '\"]'); if (el) el.click(); }}); true",
            serde_json::to_string(&targets)
                .map_err(|e| HarvestError::Browser(e.to_string()))?
        );
        let _: bool = self.eval(&script).await?;
        Ok(true)
    }

    async fn scroll_candidates(&self) -> Result<Vec<ScrollCandidate>, HarvestError> {
        self.eval(LIST_SCROLLABLES_SCRIPT).await
    }

    async fn scroll_to(&self, target: ScrollTarget) -> Result<(), HarvestError> {
        let script = match target {
            ScrollTarget::Element(index) => format!(
                "(() => {{ const el = document.querySelector('[data-gemharvest-scroll=\"{}\"]'); if (el) el.scrollTop = el.scrollHeight; return true; }})()",
                index
            ),
            ScrollTarget::Page => SCROLL_PAGE_SCRIPT.to_string(),
        };
        let _: bool = self.eval(&script).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<ChangeSubscription, HarvestError> {
        let start: u64 = self.eval(OBSERVE_SCRIPT).await?;
        let feed = Arc::new(ChangeFeed::new());
        feed.publish(start);
        let subscription = feed.subscribe();

        let page = self.page.clone();
        let interval = self.poll_interval;
        let poller = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match evaluate::<u64>(&page, CHANGE_COUNT_SCRIPT).await {
                    Ok(count) => feed.publish(count),
                    Err(e) => {
                        trace!("Change poll stopped: {}", e);
                        break;
                    }
                }
            }
        });

        let page = self.page.clone();
        Ok(subscription.on_release(move || {
            poller.abort();
            tokio::spawn(async move {
                let _ = evaluate::<bool>(&page, DISCONNECT_SCRIPT).await;
            });
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Position of `needle` in `script`, failing the test when absent.
    fn position(script: &str, needle: &str) -> usize {
        script
            .find(needle)
            .unwrap_or_else(|| panic!("{:?} not found", needle))
    }

    #[test]
    fn listing_scripts_clear_stale_tags_before_tagging() {
        for (script, attr) in [
            (LIST_CONTROLS_SCRIPT, "data-gemharvest-control"),
            (LIST_SCROLLABLES_SCRIPT, "data-gemharvest-scroll"),
        ] {
            let cleared = position(script, &format!("removeAttribute('{}')", attr));
            let tagged = position(script, &format!("setAttribute('{}'", attr));
            assert!(cleared < tagged, "{} is tagged before stale tags are cleared", attr);
        }
    }
}
