//! Shared helpers for CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use gemharvest::history::{HarvestError, Record, Schema};
use gemharvest::loader::ProgressFn;
use gemharvest::output::sink_for;

/// Spinner on stderr with a status message.
pub fn spinner(message: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

/// Progress callback updating `progress`'s message.
pub fn progress_fn(progress: &ProgressBar) -> ProgressFn {
    let progress = progress.clone();
    Arc::new(move |message: &str| progress.set_message(message.to_string()))
}

/// Print the short failure message and turn the error into an anyhow error.
pub fn load_failed(error: HarvestError) -> anyhow::Error {
    eprintln!("{} {}", style("✗").red(), error.user_message());
    anyhow::Error::new(error)
}

/// Write records to `output` (stdout when `None`) and report the count.
pub fn write_records(
    schema: &Schema,
    records: &[Record],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut sink = sink_for(output);
    let rows = sink.write(schema, records).map_err(load_failed)?;
    eprintln!(
        "{} Wrote {} rows to {}",
        style("✓").green(),
        rows,
        sink.describe()
    );
    Ok(())
}
