//! Output sinks for rendered CSV.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::history::{csv, HarvestError, Record, Schema};

/// Destination of a harvest.
pub trait OutputSink {
    /// Render and write `records`; returns the number of rows written.
    fn write(&mut self, schema: &Schema, records: &[Record]) -> Result<usize, HarvestError>;

    /// Human-readable destination name.
    fn describe(&self) -> String;
}

/// Writes CSV to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, schema: &Schema, records: &[Record]) -> Result<usize, HarvestError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", csv::render(schema, records))?;
        stdout.flush()?;
        Ok(records.len())
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}

/// Writes CSV to a file, creating parent directories.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn write(&mut self, schema: &Schema, records: &[Record]) -> Result<usize, HarvestError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, csv::render(schema, records))?;
        info!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(records.len())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Sink for an optional output path: the file if given, else stdout.
pub fn sink_for(path: Option<&Path>) -> Box<dyn OutputSink> {
    match path {
        Some(path) => Box::new(FileSink::new(path)),
        None => Box::new(StdoutSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_writes_csv_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("history.csv");
        let schema = Schema::generic();
        let records = vec![
            Record::from_values(&schema, vec!["Bought a booster".into()]),
            Record::from_values(&schema, vec!["Sold, then rebought".into()]),
        ];

        let mut sink = FileSink::new(&path);
        assert_eq!(sink.write(&schema, &records).unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "entry\nBought a booster\n\"Sold, then rebought\""
        );
    }

    #[test]
    fn sink_for_picks_destination() {
        assert_eq!(sink_for(None).describe(), "stdout");
        assert_eq!(sink_for(Some(Path::new("out.csv"))).describe(), "out.csv");
    }
}
