//! Interaction loader: reveals lazily loaded history on a live page.
//!
//! Waits for the first rows, then runs rounds of "click load-more, scroll
//! to the bottom, wait for growth" until the page stops producing rows for
//! a few consecutive rounds or the round budget runs out. Every round's
//! scan is merged into the harvesting context.

use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::live::{pick_scroll_target, LivePage, ScrollTarget};
use super::{HarvestContext, HistoryLoader, LoadReport, ProgressFn};
use crate::config::LoaderConfig;
use crate::history::{count_rows, extract_document, Batch, ExtractionMode, HarvestError};

/// Where the loader is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    Idle,
    WaitingInitial,
    RoundLoop,
    Done,
}

/// Loader driving a [`LivePage`].
pub struct InteractiveLoader {
    page: Arc<dyn LivePage>,
    mode: ExtractionMode,
    config: LoaderConfig,
    progress: Option<ProgressFn>,
    phase: Mutex<LoaderPhase>,
}

impl InteractiveLoader {
    pub fn new(page: Arc<dyn LivePage>, mode: ExtractionMode, config: LoaderConfig) -> Self {
        Self {
            page,
            mode,
            config,
            progress: None,
            phase: Mutex::new(LoaderPhase::Idle),
        }
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

    /// Current phase of the run.
    pub fn phase(&self) -> LoaderPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, phase: LoaderPhase) {
        debug!("Interaction loader entering {:?}", phase);
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    async fn scan(&self) -> Result<Batch, HarvestError> {
        let html = self.page.snapshot().await?;
        Ok(extract_document(&html, self.mode))
    }

    async fn row_count(&self) -> Result<usize, HarvestError> {
        let html = self.page.snapshot().await?;
        Ok(count_rows(&html, self.mode))
    }

    /// Poll until rows appear or the attempt budget is spent.
    /// Returns the last observed count (zero when nothing appeared).
    async fn wait_for_initial_rows(&self, context: &HarvestContext) -> Result<usize, HarvestError> {
        for attempt in 1..=self.config.initial_attempts {
            if context.is_cancelled() {
                return Err(HarvestError::Superseded);
            }
            let count = self.row_count().await?;
            if count > 0 {
                debug!("Found {} rows after {} attempts", count, attempt);
                return Ok(count);
            }
            tokio::time::sleep(self.config.initial_delay()).await;
        }
        info!(
            "No rows after {} attempts, continuing with an empty page",
            self.config.initial_attempts
        );
        Ok(0)
    }

    async fn scroll_to_bottom(&self) -> Result<ScrollTarget, HarvestError> {
        let candidates = self.page.scroll_candidates().await?;
        let target = pick_scroll_target(&candidates, self.config.min_scroll_extent);
        self.page.scroll_to(target).await?;
        tokio::time::sleep(self.config.scroll_settle()).await;
        Ok(target)
    }

    /// Wait until the row count exceeds `previous`.
    ///
    /// Fails with `GrowthTimeout` when the deadline passes first and with
    /// `Superseded` when the context is cancelled. The change subscription
    /// is released on every exit path.
    async fn wait_for_growth(
        &self,
        context: &HarvestContext,
        previous: usize,
        timeout: Duration,
    ) -> Result<(), HarvestError> {
        let mut subscription = self.page.subscribe().await?;
        if self.row_count().await? > previous {
            return Ok(());
        }

        let mut deadline = pin!(tokio::time::sleep(timeout));
        let mut feed_open = true;
        loop {
            tokio::select! {
                _ = context.cancelled() => return Err(HarvestError::Superseded),
                _ = &mut deadline => return Err(HarvestError::GrowthTimeout),
                changed = subscription.changed(), if feed_open => {
                    if !changed {
                        feed_open = false;
                        continue;
                    }
                    if self.row_count().await? > previous {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn run(&self, context: &HarvestContext) -> Result<LoadReport, HarvestError> {
        let mut report = LoadReport::default();

        self.enter(LoaderPhase::WaitingInitial);
        self.report("Waiting for history rows");
        let initial = self.wait_for_initial_rows(context).await?;

        let batch = self.scan().await?;
        report.kind = Some(batch.kind);
        let mut previous = batch.count.max(initial);
        context.merge(batch)?;

        if previous == 0 {
            self.enter(LoaderPhase::Done);
            return Ok(report);
        }

        self.enter(LoaderPhase::RoundLoop);
        let mut idle = 0;
        for round in 1..=self.config.max_rounds {
            if context.is_cancelled() {
                return Err(HarvestError::Superseded);
            }
            report.rounds = round;

            let clicked = self
                .page
                .activate_load_more(&self.config.load_more_labels)
                .await?;
            let target = self.scroll_to_bottom().await?;

            let grew = match self
                .wait_for_growth(context, previous, self.config.growth_timeout())
                .await
            {
                Ok(()) => true,
                Err(HarvestError::GrowthTimeout) => false,
                Err(e) => return Err(e),
            };

            let batch = self.scan().await?;
            let current = batch.count;
            report.kind = Some(batch.kind);
            let added = context.merge(batch)?;
            debug!(
                "Round {}: clicked={}, scrolled {:?}, grew={}, rows {} -> {}, {} new",
                round, clicked, target, grew, previous, current, added
            );
            self.report(&format!("Round {}: {} records", round, context.len()));

            if current > previous {
                previous = current;
                idle = 0;
            } else if !clicked && !grew {
                idle += 1;
                if idle >= self.config.idle_rounds {
                    debug!("Stopping after {} idle rounds", idle);
                    break;
                }
            }
        }

        self.enter(LoaderPhase::Done);
        Ok(report)
    }
}

#[async_trait]
impl HistoryLoader for InteractiveLoader {
    fn name(&self) -> &str {
        "interaction"
    }

    async fn load(&self, context: &HarvestContext) -> Result<LoadReport, HarvestError> {
        self.run(context).await
    }
}
