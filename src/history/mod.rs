//! History record extraction.
//!
//! Turns an arbitrary, unlabeled document tree into a batch of normalized
//! records:
//! - `locator`: finds the most likely record collection (table, role grid, list)
//! - `rows`: converts each row into a schema-aligned record
//! - `events`: structured extraction of event blocks
//! - `matches`: nested match-history tables inside an event
//! - `dedup`: key-unique accumulation across observations
//! - `csv`: deterministic CSV rendering

pub mod csv;
pub mod dedup;
mod error;
pub mod events;
pub mod locator;
pub mod matches;
pub mod rows;
pub mod text;

pub use dedup::{dedup_key, AccumulatedEntries};
pub use error::HarvestError;
pub use locator::{locate, ContainerDescriptor, ContainerKind, LocatorProfile};
pub use matches::{parse_matches, MatchRow};

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

use text::column_key;

/// Columns of the event schema, in CSV order.
pub const EVENT_COLUMNS: [&str; 6] = [
    "title",
    "start_time",
    "store",
    "event_type",
    "format",
    "match_record",
];

/// Column of the generic single-field schema.
pub const GENERIC_COLUMN: &str = "entry";

/// Which field set records are extracted into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Six-field event schema.
    #[default]
    Events,
    /// Schema follows the located container (table headers or `entry`).
    Generic,
}

/// Ordered column names of the active schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// The single `entry` column schema.
    pub fn generic() -> Self {
        Self::new(vec![GENERIC_COLUMN.to_string()])
    }

    /// The six-field event schema.
    pub fn events() -> Self {
        Self::new(EVENT_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    /// Build a schema from table or grid headers.
    ///
    /// Blank headers become `column_N`; with no headers at all the schema is
    /// `column_1..column_{widest_row}`. Falls back to the generic schema when
    /// there is nothing to size it by.
    pub fn from_headers(headers: &[String], widest_row: usize) -> Self {
        if headers.is_empty() {
            if widest_row == 0 {
                return Self::generic();
            }
            return Self::new((1..=widest_row).map(|i| format!("column_{}", i)).collect());
        }
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if h.is_empty() {
                    format!("column_{}", i + 1)
                } else {
                    h.clone()
                }
            })
            .collect();
        Self::new(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether this is the six-field event schema.
    pub fn is_events(&self) -> bool {
        self.columns.len() == EVENT_COLUMNS.len()
            && self.columns.iter().zip(EVENT_COLUMNS).all(|(a, b)| a == b)
    }

    /// Position of a column, compared by normalized key.
    pub fn position(&self, name: &str) -> Option<usize> {
        let key = column_key(name);
        self.columns.iter().position(|c| column_key(c) == key)
    }
}

/// One harvested record: schema-aligned fields plus identity attributes
/// that never appear in the CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
    id: Option<String>,
    date: Option<String>,
}

impl Record {
    /// Align positional values to the schema: extra values are dropped and
    /// missing ones become empty strings.
    pub fn from_values(schema: &Schema, values: Vec<String>) -> Self {
        let mut values = values.into_iter();
        let fields = schema
            .columns()
            .iter()
            .map(|column| (column.clone(), values.next().unwrap_or_default()))
            .collect();
        Self {
            fields,
            id: None,
            date: None,
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id.filter(|s| !s.is_empty());
        self
    }

    pub fn with_date(mut self, date: Option<String>) -> Self {
        self.date = date.filter(|s| !s.is_empty());
        self
    }

    /// Field value by column name (normalized comparison).
    pub fn get(&self, column: &str) -> Option<&str> {
        let key = column_key(column);
        self.fields
            .iter()
            .find(|(name, _)| column_key(name) == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }
}

/// Records found by one scan of one tree.
#[derive(Debug, Clone)]
pub struct Batch {
    pub kind: ContainerKind,
    pub schema: Schema,
    /// Row count reported by the locator (may include a header row).
    pub count: usize,
    pub records: Vec<Record>,
}

/// Locate the record container in an HTML document and extract its rows.
pub fn extract_document(html: &str, mode: ExtractionMode) -> Batch {
    let document = Html::parse_document(html);
    let profile = LocatorProfile::for_mode(mode);
    let container = locate(&document, &profile);
    let schema = match mode {
        ExtractionMode::Events => Schema::events(),
        ExtractionMode::Generic => rows::schema_for(&container),
    };

    let records: Vec<Record> = container
        .data_rows()
        .into_iter()
        .map(|row| rows::extract_row(container.kind(), row, &schema))
        .collect();

    debug!(
        "Extracted {} records from {} container ({} rows)",
        records.len(),
        container.kind(),
        container.count()
    );

    Batch {
        kind: container.kind(),
        schema,
        count: container.count(),
        records,
    }
}

/// Row count of the located container, without extracting records.
pub fn count_rows(html: &str, mode: ExtractionMode) -> usize {
    let document = Html::parse_document(html);
    locate(&document, &LocatorProfile::for_mode(mode)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_pads_and_truncates_to_schema() {
        let schema = Schema::new(vec!["a".into(), "b".into()]);
        let short = Record::from_values(&schema, vec!["1".into()]);
        assert_eq!(short.values().collect::<Vec<_>>(), vec!["1", ""]);

        let long = Record::from_values(&schema, vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(long.values().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn schema_from_headers_fills_blanks() {
        let schema = Schema::from_headers(&["Date".into(), "".into()], 0);
        assert_eq!(schema.columns(), &["Date".to_string(), "column_2".to_string()]);

        let sized = Schema::from_headers(&[], 3);
        assert_eq!(sized.len(), 3);
        assert_eq!(sized.columns()[2], "column_3");

        assert_eq!(Schema::from_headers(&[], 0), Schema::generic());
    }

    #[test]
    fn record_lookup_is_key_normalized() {
        let schema = Schema::new(vec!["Start Time".into()]);
        let record = Record::from_values(&schema, vec!["18:00".into()]);
        assert_eq!(record.get("start_time"), Some("18:00"));
        assert_eq!(schema.position("start-time"), Some(0));
    }

    #[test]
    fn events_schema_is_recognized() {
        assert!(Schema::events().is_events());
        assert!(!Schema::generic().is_events());
    }

    #[test]
    fn extract_document_generic_table() {
        let html = r#"<html><body><main><table>
            <thead><tr><th>Date</th><th>Event</th></tr></thead>
            <tbody>
              <tr><td>2024-01-01</td><td>Armory</td></tr>
              <tr><td>2024-01-08</td><td>Skirmish</td></tr>
            </tbody></table></main></body></html>"#;
        let batch = extract_document(html, ExtractionMode::Generic);
        assert_eq!(batch.kind, ContainerKind::Table);
        assert_eq!(batch.schema.columns(), &["Date".to_string(), "Event".to_string()]);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].get("Event"), Some("Skirmish"));
        assert_eq!(count_rows(html, ExtractionMode::Generic), 2);
    }

    #[test]
    fn extract_document_without_container_is_empty() {
        let batch = extract_document("<html><body><p></p></body></html>", ExtractionMode::Generic);
        assert_eq!(batch.kind, ContainerKind::Unknown);
        assert!(batch.records.is_empty());
        assert_eq!(batch.schema, Schema::generic());
    }
}
