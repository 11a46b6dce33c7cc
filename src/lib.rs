//! gemharvest - export a player's event history to CSV.
//!
//! Locates the history collection in an arbitrary profile page, reveals
//! everything the page can produce (by interacting with a live page or by
//! walking numbered pages), deduplicates the records and renders them as
//! CSV.

pub mod config;
pub mod history;
pub mod loader;
pub mod output;
pub mod scrapers;

pub use config::HarvestConfig;
pub use history::{extract_document, Batch, ExtractionMode, HarvestError, Record, Schema};
pub use loader::{HarvestSession, HarvestSnapshot, HistoryLoader, LoadReport};
