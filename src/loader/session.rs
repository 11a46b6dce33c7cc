//! Per-session harvesting state.
//!
//! A session owns the accumulated entries of the current harvesting
//! operation and the memoized load future. `begin` resets both atomically
//! and cancels the previous operation's context so its late callbacks and
//! fetch results are ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info};

use super::{HistoryLoader, LoadReport};
use crate::history::{csv, AccumulatedEntries, Batch, HarvestError, Record, Schema};

/// Final state of a completed load.
#[derive(Debug, Clone)]
pub struct HarvestSnapshot {
    pub schema: Schema,
    pub records: Vec<Record>,
    pub report: LoadReport,
}

impl HarvestSnapshot {
    pub fn to_csv(&self) -> String {
        csv::render(&self.schema, &self.records)
    }
}

#[derive(Debug, Default)]
struct ContextState {
    entries: AccumulatedEntries,
    /// Schema of the latest scan, used when no record was ever merged.
    last_schema: Option<Schema>,
}

/// Handle to one harvesting operation.
///
/// Clones share the same entries. Once the operation is superseded every
/// merge becomes a no-op.
#[derive(Debug, Clone)]
pub struct HarvestContext {
    label: Arc<str>,
    generation: u64,
    state: Arc<Mutex<ContextState>>,
    cancel: CancellationToken,
}

impl HarvestContext {
    fn new(label: &str, generation: u64) -> Self {
        Self {
            label: Arc::from(label),
            generation,
            state: Arc::new(Mutex::new(ContextState::default())),
            cancel: CancellationToken::new(),
        }
    }

    /// Standalone context not owned by a session.
    pub fn detached(label: &str) -> Self {
        Self::new(label, 0)
    }

    fn lock(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the operation has been superseded.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Merge one scan's batch into the accumulated entries.
    ///
    /// Returns the number of new records, or `Superseded` when the context
    /// was cancelled (nothing is merged in that case).
    pub fn merge(&self, batch: Batch) -> Result<usize, HarvestError> {
        if self.is_cancelled() {
            debug!("Dropping batch for superseded context {}", self.label);
            return Err(HarvestError::Superseded);
        }
        let mut state = self.lock();
        if !batch.records.is_empty() {
            state.entries.adopt_schema(&batch.schema);
        }
        state.last_schema = Some(batch.schema);
        Ok(state.entries.merge(batch.records))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schema the accumulated records render with.
    pub fn schema(&self) -> Schema {
        let state = self.lock();
        state
            .entries
            .schema()
            .or(state.last_schema.as_ref())
            .cloned()
            .unwrap_or_else(Schema::generic)
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().entries.records().to_vec()
    }

    pub fn render_csv(&self) -> String {
        csv::render(&self.schema(), &self.records())
    }

    fn snapshot(&self, report: LoadReport) -> HarvestSnapshot {
        HarvestSnapshot {
            schema: self.schema(),
            records: self.records(),
            report,
        }
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<HarvestSnapshot>, HarvestError>>>;

struct SessionState {
    context: HarvestContext,
    load: Option<SharedLoad>,
}

/// Harvesting session: current context plus its memoized load.
pub struct HarvestSession {
    state: Mutex<SessionState>,
}

impl HarvestSession {
    pub fn new(label: &str) -> Self {
        Self {
            state: Mutex::new(SessionState {
                context: HarvestContext::new(label, 0),
                load: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new harvesting operation (e.g. after navigation).
    ///
    /// Cancels the previous context, swaps in empty entries and forgets the
    /// memoized load, all under one lock.
    pub fn begin(&self, label: &str) -> HarvestContext {
        let mut state = self.lock();
        state.context.cancel();
        let generation = state.context.generation + 1;
        state.context = HarvestContext::new(label, generation);
        state.load = None;
        info!("Started harvesting context {} (generation {})", label, generation);
        state.context.clone()
    }

    /// The current operation's context.
    pub fn context(&self) -> HarvestContext {
        self.lock().context.clone()
    }

    /// Run `loader` once for the current context.
    ///
    /// Callers arriving while the load is in flight, or after it finished,
    /// share the same outcome.
    pub async fn ensure_loaded(
        &self,
        loader: Arc<dyn HistoryLoader>,
    ) -> Result<Arc<HarvestSnapshot>, HarvestError> {
        let load = {
            let mut state = self.lock();
            match &state.load {
                Some(load) => load.clone(),
                None => {
                    let context = state.context.clone();
                    let load = run_load(loader, context).boxed().shared();
                    state.load = Some(load.clone());
                    load
                }
            }
        };
        load.await
    }

    /// CSV of whatever the current context has accumulated so far.
    pub fn render_csv(&self) -> String {
        self.context().render_csv()
    }
}

async fn run_load(
    loader: Arc<dyn HistoryLoader>,
    context: HarvestContext,
) -> Result<Arc<HarvestSnapshot>, HarvestError> {
    debug!("Running {} loader for {}", loader.name(), context.label());
    let mut report = loader.load(&context).await?;
    if context.is_cancelled() {
        return Err(HarvestError::Superseded);
    }
    report.records = context.len();
    info!(
        "{} loader finished: {} records, {} rounds, {} pages",
        loader.name(),
        report.records,
        report.rounds,
        report.pages_fetched
    );
    Ok(Arc::new(context.snapshot(report)))
}
