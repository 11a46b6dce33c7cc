//! Incremental history loading.
//!
//! Two strategies fill a harvesting context with every record the page
//! can produce:
//! - `interact`: drives a live page (load-more clicks, scrolling, change waits)
//! - `paginate`: walks `?page=N` URLs with a page fetcher
//!
//! `session` holds the per-session context and memoizes the load so
//! concurrent triggers share one run.

pub mod interact;
pub mod live;
pub mod paginate;
mod session;

pub use interact::{InteractiveLoader, LoaderPhase};
pub use live::{ChangeFeed, ChangeSubscription, LivePage, ScrollCandidate, ScrollTarget};
pub use paginate::{FetchError, PageFetcher, PaginatedLoader};
pub use session::{HarvestContext, HarvestSession, HarvestSnapshot};

use std::sync::Arc;

use async_trait::async_trait;

use crate::history::{ContainerKind, HarvestError};

/// Summary of one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Interaction rounds run.
    pub rounds: u32,
    /// Pages fetched over the network (the initial page counts if fetched).
    pub pages_fetched: u32,
    /// Records accumulated in the context when the load finished.
    pub records: usize,
    /// Container kind of the last scan.
    pub kind: Option<ContainerKind>,
}

/// Callback receiving short progress messages.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// A strategy that loads every history record into a context.
#[async_trait]
pub trait HistoryLoader: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Load everything, merging each scan into `context`.
    async fn load(&self, context: &HarvestContext) -> Result<LoadReport, HarvestError>;
}
