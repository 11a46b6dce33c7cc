//! Structured extraction of event blocks into the six-field event schema.

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use tracing::trace;

use super::locator::parse_static;
use super::matches::{final_record, parse_matches};
use super::text::element_text;
use super::{Record, Schema};

static TITLE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".event__title", "h2", "h3", "h4", "h5"]
        .into_iter()
        .map(parse_static)
        .collect()
});
static META_ITEMS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".event__meta-item", ".event__meta li"]
        .into_iter()
        .map(parse_static)
        .collect()
});
static DETAILS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".event__extra-details", ".event__details"]
        .into_iter()
        .map(parse_static)
        .collect()
});
static DATE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".event__when", ".event__date", "time"]
        .into_iter()
        .map(parse_static)
        .collect()
});

/// Meta items map onto these columns, in order.
const META_COLUMNS: [&str; 4] = ["start_time", "store", "event_type", "format"];

/// Attributes that carry a stable per-record identifier.
const ID_ATTRIBUTES: [&str; 3] = ["data-event-id", "data-id", "id"];

/// First element matched by any selector, in selector priority order.
fn first_match<'a>(scope: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| scope.select(s).next())
}

/// Stable identifier exposed by the element itself, if any.
pub fn element_identity(element: ElementRef<'_>) -> Option<String> {
    ID_ATTRIBUTES
        .iter()
        .find_map(|attr| element.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn event_date(block: ElementRef<'_>) -> Option<String> {
    let element = first_match(block, &DATE)?;
    element
        .value()
        .attr("datetime")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .or_else(|| Some(element_text(element)).filter(|t| !t.is_empty()))
}

/// Extract one event block.
///
/// Returns `None` when the block exposes neither a title nor meta items, so
/// the caller can fall back to whole-text extraction.
pub fn extract_event(block: ElementRef<'_>, schema: &Schema) -> Option<Record> {
    let title = first_match(block, &TITLE).map(element_text).unwrap_or_default();

    let meta: Vec<String> = META_ITEMS
        .iter()
        .map(|s| block.select(s).map(element_text).collect::<Vec<_>>())
        .find(|items| !items.is_empty())
        .unwrap_or_default();

    if title.is_empty() && meta.is_empty() {
        return None;
    }

    let details = first_match(block, &DETAILS).unwrap_or(block);
    let matches = parse_matches(details);
    let record = final_record(&matches).unwrap_or_default();
    trace!("Event {:?}: {} meta items, {} matches", title, meta.len(), matches.len());

    let mut values = vec![String::new(); schema.len()];
    let mut assign = |column: &str, value: String| {
        if let Some(i) = schema.position(column) {
            values[i] = value;
        }
    };
    assign("title", title);
    for (column, value) in META_COLUMNS.iter().zip(meta) {
        assign(column, value);
    }
    assign("match_record", record);

    Some(
        Record::from_values(schema, values)
            .with_id(element_identity(block))
            .with_date(event_date(block)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const EVENT: &str = r#"
        <div class="event" data-event-id="ev-42">
          <h4 class="event__title">Regional Qualifier</h4>
          <time datetime="2024-03-09">Mar 9</time>
          <div class="event__meta">
            <span class="event__meta-item">18:00</span>
            <span class="event__meta-item">Store X</span>
            <span class="event__meta-item">Tournament</span>
            <span class="event__meta-item">Classic Constructed</span>
          </div>
          <div class="event__extra-details">
            <table><tr><th>Store</th></tr><tr><td>Store X</td></tr></table>
            <table>
              <tr><th>Round</th><th>Opponent</th><th>Result</th><th>Record</th></tr>
              <tr><td>1</td><td>Alice</td><td>Win</td><td>1-0</td></tr>
              <tr><td>2</td><td>Bob</td><td>Loss</td><td>1 - 1</td></tr>
            </table>
          </div>
        </div>"#;

    fn block(html: &Html) -> ElementRef<'_> {
        let sel = Selector::parse(".event").unwrap();
        html.select(&sel).next().unwrap()
    }

    #[test]
    fn extracts_all_event_fields() {
        let html = Html::parse_fragment(EVENT);
        let record = extract_event(block(&html), &Schema::events()).unwrap();
        assert_eq!(
            record.values().collect::<Vec<_>>(),
            vec![
                "Regional Qualifier",
                "18:00",
                "Store X",
                "Tournament",
                "Classic Constructed",
                "1-1"
            ]
        );
        assert_eq!(record.id(), Some("ev-42"));
        assert_eq!(record.date(), Some("2024-03-09"));
    }

    #[test]
    fn missing_meta_items_stay_empty() {
        let html = Html::parse_fragment(
            r#"<div class="event"><h3>Armory</h3><ul class="event__meta"><li>19:00</li></ul></div>"#,
        );
        let record = extract_event(block(&html), &Schema::events()).unwrap();
        assert_eq!(record.get("title"), Some("Armory"));
        assert_eq!(record.get("start_time"), Some("19:00"));
        assert_eq!(record.get("store"), Some(""));
        assert_eq!(record.get("match_record"), Some(""));
        assert_eq!(record.id(), None);
    }

    #[test]
    fn unstructured_block_yields_none() {
        let html = Html::parse_fragment(r#"<div class="event">just some text</div>"#);
        assert!(extract_event(block(&html), &Schema::events()).is_none());
    }
}
