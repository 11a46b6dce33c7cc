//! Row extraction: one located row handle into one schema-aligned record.

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::trace;

use super::events::{element_identity, extract_event};
use super::locator::{parse_static, ContainerDescriptor, ContainerKind};
use super::text::{column_key, element_text};
use super::{HarvestError, Record, Schema};

static TABLE_CELL: LazyLock<Selector> = LazyLock::new(|| parse_static("th, td"));
static GRID_CELL: LazyLock<Selector> =
    LazyLock::new(|| parse_static(r#"[role="cell"], [role="gridcell"]"#));
static LABELED: LazyLock<Selector> = LazyLock::new(|| parse_static("[data-label]"));

/// Schema implied by a container when no fixed schema is imposed.
pub fn schema_for(container: &ContainerDescriptor<'_>) -> Schema {
    match container {
        ContainerDescriptor::Table { headers, rows, .. } => {
            let widest = rows
                .iter()
                .map(|r| r.select(&TABLE_CELL).count())
                .max()
                .unwrap_or(0);
            Schema::from_headers(headers, widest)
        }
        ContainerDescriptor::RoleGrid { headers, rows } => {
            let widest = rows
                .iter()
                .map(|r| r.select(&GRID_CELL).count())
                .max()
                .unwrap_or(0);
            Schema::from_headers(headers, widest)
        }
        ContainerDescriptor::List { .. } | ContainerDescriptor::Unknown => Schema::generic(),
    }
}

/// Convert one row into a record aligned to `schema`.
///
/// Table and grid cells map positionally onto the schema; surplus cells are
/// dropped. List rows try label-keyed children first, then event structure
/// (for the event schema), then the whole row's text in the first column.
pub fn extract_row(kind: ContainerKind, row: ElementRef<'_>, schema: &Schema) -> Record {
    let record = match kind {
        ContainerKind::Table => cells(row, &TABLE_CELL, schema),
        ContainerKind::RoleGrid => cells(row, &GRID_CELL, schema),
        ContainerKind::List if schema.len() > 1 => labeled(row, schema)
            .or_else(|| schema.is_events().then(|| extract_event(row, schema)).flatten())
            .unwrap_or_else(|| {
                let fallback = HarvestError::EmptyFieldFallback {
                    field: schema.columns()[0].clone(),
                };
                trace!("{}; using whole row text", fallback);
                whole_text(row, schema)
            }),
        ContainerKind::List | ContainerKind::Unknown => whole_text(row, schema),
    };

    if record.id().is_none() {
        record.with_id(element_identity(row))
    } else {
        record
    }
}

fn cells(row: ElementRef<'_>, selector: &Selector, schema: &Schema) -> Record {
    let values = row.select(selector).map(element_text).collect();
    Record::from_values(schema, values)
}

fn whole_text(row: ElementRef<'_>, schema: &Schema) -> Record {
    Record::from_values(schema, vec![element_text(row)])
}

/// Label-keyed extraction from `[data-label]` children.
fn labeled(row: ElementRef<'_>, schema: &Schema) -> Option<Record> {
    let mut by_label: HashMap<String, String> = HashMap::new();
    let mut seen_any = false;
    for element in row.select(&LABELED) {
        seen_any = true;
        let Some(label) = element.value().attr("data-label").filter(|l| !l.trim().is_empty()) else {
            continue;
        };
        by_label.insert(column_key(label), element_text(element));
    }
    if !seen_any {
        return None;
    }

    let values = schema
        .columns()
        .iter()
        .map(|column| by_label.get(&column_key(column)).cloned().unwrap_or_default())
        .collect();
    Some(Record::from_values(schema, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::locator::{locate, LocatorProfile};
    use scraper::Html;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn table_cells_map_to_headers_and_drop_overflow() {
        let html = doc(
            "<table><thead><tr><th>Date</th><th>Event</th></tr></thead>\
             <tbody><tr><td>2024-01-01</td><td>Armory</td><td>extra</td></tr>\
             <tr><td>2024-01-02</td></tr></tbody></table>",
        );
        let container = locate(&html, &LocatorProfile::generic());
        let schema = schema_for(&container);
        let rows = container.data_rows();

        let first = extract_row(container.kind(), rows[0], &schema);
        assert_eq!(first.values().collect::<Vec<_>>(), vec!["2024-01-01", "Armory"]);

        let second = extract_row(container.kind(), rows[1], &schema);
        assert_eq!(second.values().collect::<Vec<_>>(), vec!["2024-01-02", ""]);
    }

    #[test]
    fn headerless_table_gets_positional_columns() {
        let html = doc("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>");
        let container = locate(&html, &LocatorProfile::generic());
        let schema = schema_for(&container);
        assert_eq!(schema.columns(), &["column_1".to_string(), "column_2".to_string()]);
    }

    #[test]
    fn grid_cells_extracted_in_order() {
        let html = doc(
            r#"<div role="row"><span role="columnheader">A</span><span role="columnheader">B</span></div>
               <div role="row" data-id="r1"><span role="gridcell"> x </span><span role="cell">y</span></div>"#,
        );
        let container = locate(&html, &LocatorProfile::generic());
        let schema = schema_for(&container);
        let record = extract_row(container.kind(), container.rows()[0], &schema);
        assert_eq!(record.values().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(record.id(), Some("r1"));
    }

    #[test]
    fn list_rows_prefer_labeled_children() {
        let html = doc(
            r#"<div class="event">
                 <span data-label="Title">Armory</span>
                 <span data-label="Start Time">19:00</span>
                 <span data-label="unrelated">zzz</span>
               </div>"#,
        );
        let container = locate(&html, &LocatorProfile::events());
        let record = extract_row(container.kind(), container.rows()[0], &Schema::events());
        assert_eq!(record.get("title"), Some("Armory"));
        assert_eq!(record.get("start_time"), Some("19:00"));
        assert_eq!(record.get("store"), Some(""));
    }

    #[test]
    fn list_rows_fall_back_to_whole_text() {
        let html = doc(r#"<div class="event">  Casual   play  night </div>"#);
        let container = locate(&html, &LocatorProfile::events());
        let record = extract_row(container.kind(), container.rows()[0], &Schema::events());
        assert_eq!(record.get("title"), Some("Casual play night"));
        assert_eq!(record.values().count(), 6);
    }

    #[test]
    fn generic_list_uses_entry_column() {
        let html = doc(r#"<div data-history-item="h-7">Bought   a booster</div>"#);
        let container = locate(&html, &LocatorProfile::generic());
        let schema = schema_for(&container);
        let record = extract_row(container.kind(), container.rows()[0], &schema);
        assert_eq!(record.get("entry"), Some("Bought a booster"));
    }
}
