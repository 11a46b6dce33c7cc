//! Live document interface for the interaction loader.
//!
//! A `LivePage` is a rendered page that can be snapshotted, clicked and
//! scrolled, and that publishes a change counter whenever its subtree
//! mutates. Subscriptions release their page-side observer when dropped.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

use crate::history::locator::best_candidate;
use crate::history::HarvestError;

/// An element that might be the page's scrolling history container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollCandidate {
    /// Position of the element in document order.
    pub index: usize,
    /// Computed `overflow-y` style.
    pub overflow_y: String,
    pub scroll_height: i64,
    pub client_height: i64,
}

impl ScrollCandidate {
    fn can_scroll(&self) -> bool {
        matches!(self.overflow_y.as_str(), "auto" | "scroll")
    }

    /// Scrollable extent; zero for non-scrolling elements.
    fn extent(&self) -> usize {
        if !self.can_scroll() {
            return 0;
        }
        (self.scroll_height - self.client_height).max(0) as usize
    }
}

/// Where to scroll to reach the bottom of the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    /// The element at this document-order index.
    Element(usize),
    /// The whole page.
    Page,
}

/// Pick the element with the largest scrollable extent, if that extent
/// exceeds `min_extent`; otherwise scroll the page.
pub fn pick_scroll_target(candidates: &[ScrollCandidate], min_extent: u64) -> ScrollTarget {
    match best_candidate(candidates, |c| c.extent()) {
        Some((best, extent)) if extent as u64 > min_extent => ScrollTarget::Element(best.index),
        _ => ScrollTarget::Page,
    }
}

/// Whether a control's trimmed text looks like a "load more" action.
pub fn matches_load_more(text: &str, labels: &[String]) -> bool {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return false;
    }
    labels.iter().any(|label| text.contains(&label.to_lowercase()))
}

/// Subscription to a page's change notifications.
///
/// Dropping the subscription runs its release hook, so observers and
/// polling tasks never outlive the wait that created them.
pub struct ChangeSubscription {
    receiver: watch::Receiver<u64>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ChangeSubscription {
    pub fn new(receiver: watch::Receiver<u64>) -> Self {
        Self {
            receiver,
            release: None,
        }
    }

    /// Run `release` when the subscription is dropped.
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Wait for the next change. Returns false once the feed has closed.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Publisher side of a change feed: a monotonically increasing counter.
#[derive(Debug)]
pub struct ChangeFeed {
    sender: watch::Sender<u64>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self { sender }
    }

    /// Publish a change.
    pub fn notify(&self) {
        self.sender.send_modify(|n| *n += 1);
    }

    /// Publish an externally observed counter value if it moved.
    pub fn publish(&self, value: u64) {
        self.sender.send_if_modified(|n| {
            if *n != value {
                *n = value;
                true
            } else {
                false
            }
        });
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(self.sender.subscribe())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// A rendered page the interaction loader can drive.
#[async_trait]
pub trait LivePage: Send + Sync {
    /// Current document HTML.
    async fn snapshot(&self) -> Result<String, HarvestError>;

    /// Activate every enabled control whose text matches one of `labels`.
    /// Returns whether anything was activated.
    async fn activate_load_more(&self, labels: &[String]) -> Result<bool, HarvestError>;

    /// Elements that might scroll the history.
    async fn scroll_candidates(&self) -> Result<Vec<ScrollCandidate>, HarvestError>;

    /// Scroll the target to its bottom.
    async fn scroll_to(&self, target: ScrollTarget) -> Result<(), HarvestError>;

    /// Subscribe to subtree change notifications.
    async fn subscribe(&self) -> Result<ChangeSubscription, HarvestError>;
}
