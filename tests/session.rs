//! Session memoization and reset behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use gemharvest::history::{extract_document, ExtractionMode, HarvestError};
use gemharvest::loader::{HarvestContext, HarvestSession, HistoryLoader, LoadReport};

const TABLE: &str = r#"<html><body><table>
    <thead><tr><th>Date</th><th>Event</th><th>Store</th></tr></thead>
    <tbody>
      <tr><td>2024-01-01</td><td>Armory</td><td>Store X</td></tr>
      <tr><td>2024-01-08</td><td>Armory</td><td>Store X</td></tr>
    </tbody>
</table></body></html>"#;

/// Loader that counts its runs and merges a fixed table after a delay.
struct CountingLoader {
    runs: AtomicUsize,
    delay: Duration,
}

impl CountingLoader {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicUsize::new(0),
            delay,
        })
    }

    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryLoader for CountingLoader {
    fn name(&self) -> &str {
        "counting"
    }

    async fn load(&self, context: &HarvestContext) -> Result<LoadReport, HarvestError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        context.merge(extract_document(TABLE, ExtractionMode::Generic))?;
        Ok(LoadReport {
            pages_fetched: 1,
            ..LoadReport::default()
        })
    }
}

#[tokio::test]
async fn concurrent_callers_share_one_load() {
    let session = HarvestSession::new("history");
    let loader = CountingLoader::new(Duration::from_millis(20));

    let (a, b) = tokio::join!(
        session.ensure_loaded(loader.clone()),
        session.ensure_loaded(loader.clone()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(loader.runs(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.records.len(), 2);
    assert_eq!(a.report.records, 2);

    // A later caller gets the memoized result too.
    let c = session.ensure_loaded(loader.clone()).await.unwrap();
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(loader.runs(), 1);
}

#[tokio::test]
async fn begin_resets_entries_and_memo() {
    let session = HarvestSession::new("first");
    let loader = CountingLoader::new(Duration::ZERO);

    session.ensure_loaded(loader.clone()).await.unwrap();
    let old = session.context();
    assert_eq!(old.len(), 2);

    let fresh = session.begin("second");
    assert!(old.is_cancelled());
    assert!(fresh.is_empty());
    assert_eq!(fresh.generation(), old.generation() + 1);
    assert_eq!(session.render_csv(), "entry");

    let snapshot = session.ensure_loaded(loader.clone()).await.unwrap();
    assert_eq!(loader.runs(), 2);
    assert_eq!(snapshot.records.len(), 2);
    assert_eq!(
        session.render_csv(),
        "Date,Event,Store\n2024-01-01,Armory,Store X\n2024-01-08,Armory,Store X"
    );
}

#[tokio::test]
async fn superseded_load_leaves_new_context_untouched() {
    let session = Arc::new(HarvestSession::new("first"));
    let loader = CountingLoader::new(Duration::from_millis(50));

    let running = {
        let session = session.clone();
        let loader = loader.clone();
        tokio::spawn(async move { session.ensure_loaded(loader).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let fresh = session.begin("second");

    let outcome = running.await.unwrap();
    assert_eq!(outcome.unwrap_err(), HarvestError::Superseded);
    assert!(fresh.is_empty());
    assert_eq!(session.context().generation(), 1);
}
