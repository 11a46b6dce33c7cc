//! Key-unique accumulation of records across repeated observations.

use std::collections::HashSet;

use super::{Record, Schema};

/// Discriminating fields for the fallback key, each with accepted aliases.
const KEY_FIELDS: &[&[&str]] = &[
    &["date"],
    &["title", "event", "name"],
    &["start_time", "time", "start"],
    &["store", "location", "venue"],
];

const KEY_SEPARATOR: &str = "|";

/// Dedup key for a record.
///
/// Prefers the record's stable identifier. Otherwise joins date, title,
/// start time and location; a missing field contributes an empty segment.
/// Records exposing none of those fields are keyed by all their values.
pub fn dedup_key(record: &Record) -> String {
    if let Some(id) = record.id() {
        return format!("id:{}", id);
    }

    let mut found_any = false;
    let parts: Vec<&str> = KEY_FIELDS
        .iter()
        .map(|aliases| {
            let value = aliases.iter().find_map(|alias| {
                if *alias == "date" {
                    if let Some(date) = record.date() {
                        return Some(date);
                    }
                }
                record.get(alias)
            });
            if value.is_some() {
                found_any = true;
            }
            value.unwrap_or("")
        })
        .collect();

    if found_any {
        parts.join(KEY_SEPARATOR)
    } else {
        record.values().collect::<Vec<_>>().join(KEY_SEPARATOR)
    }
}

/// Records accumulated by one harvesting operation, unique by dedup key and
/// in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AccumulatedEntries {
    schema: Option<Schema>,
    records: Vec<Record>,
    keys: HashSet<String>,
}

impl AccumulatedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch, dropping records whose key is already present.
    /// Returns the number of records added.
    pub fn merge<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = Record>,
    {
        let before = self.records.len();
        for record in batch {
            if self.keys.insert(dedup_key(&record)) {
                self.records.push(record);
            }
        }
        self.records.len() - before
    }

    /// Adopt a schema for rendering; the first schema seen sticks.
    pub fn adopt_schema(&mut self, schema: &Schema) {
        if self.schema.is_none() {
            self.schema = Some(schema.clone());
        }
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, time: &str, store: &str) -> Record {
        Record::from_values(
            &Schema::events(),
            vec![title.into(), time.into(), store.into()],
        )
    }

    #[test]
    fn merge_drops_duplicates_and_keeps_order() {
        let mut entries = AccumulatedEntries::new();
        let added = entries.merge(vec![
            event("Armory", "18:00", "Store X"),
            event("Skirmish", "12:00", "Store Y"),
            event("Armory", "18:00", "Store X"),
        ]);
        assert_eq!(added, 2);
        assert_eq!(entries.records()[0].get("title"), Some("Armory"));
        assert_eq!(entries.records()[1].get("title"), Some("Skirmish"));
    }

    #[test]
    fn merge_is_idempotent() {
        let batch = vec![
            event("Armory", "18:00", "Store X"),
            event("Armory", "19:00", "Store X"),
        ];
        let mut once = AccumulatedEntries::new();
        once.merge(batch.clone());

        let mut twice = once.clone();
        assert_eq!(twice.merge(batch), 0);
        assert_eq!(twice.records(), once.records());
    }

    #[test]
    fn identifier_beats_field_key() {
        let a = event("Armory", "18:00", "Store X").with_id(Some("1".into()));
        let b = event("Armory", "18:00", "Store X").with_id(Some("2".into()));
        let mut entries = AccumulatedEntries::new();
        assert_eq!(entries.merge(vec![a, b]), 2);
    }

    #[test]
    fn date_distinguishes_otherwise_equal_events() {
        let a = event("Armory", "18:00", "Store X").with_date(Some("2024-01-01".into()));
        let b = event("Armory", "18:00", "Store X").with_date(Some("2024-01-08".into()));
        assert_ne!(dedup_key(&a), dedup_key(&b));
        assert_eq!(dedup_key(&a), "2024-01-01|Armory|18:00|Store X");
    }

    #[test]
    fn generic_records_keyed_by_content() {
        let schema = Schema::generic();
        let a = Record::from_values(&schema, vec!["Bought a booster".into()]);
        let b = Record::from_values(&schema, vec!["Sold a playmat".into()]);
        assert_ne!(dedup_key(&a), dedup_key(&b));
    }

    #[test]
    fn first_schema_sticks() {
        let mut entries = AccumulatedEntries::new();
        entries.adopt_schema(&Schema::events());
        entries.adopt_schema(&Schema::generic());
        assert_eq!(entries.schema(), Some(&Schema::events()));
    }
}
