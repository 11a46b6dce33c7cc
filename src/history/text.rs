//! Text normalization helpers.

use scraper::ElementRef;

/// Collapse whitespace runs to a single space and trim.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text content of an element and its descendants.
pub fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    normalize_text(&raw)
}

/// Key used to compare column names and field labels.
///
/// Lowercases and folds every run of non-alphanumeric characters into a
/// single `_`, so "Start Time", "start-time" and "start_time" all match.
pub fn column_key(s: &str) -> String {
    let mut key = String::with_capacity(s.len());
    let mut pending_sep = false;
    for ch in s.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  Store \n\t X  "), "Store X");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \n "), "");
    }

    #[test]
    fn element_text_joins_nested_nodes() {
        let html = Html::parse_fragment("<div><span>Regional</span>\n <b>Qualifier</b></div>");
        let sel = Selector::parse("div").unwrap();
        let div = html.select(&sel).next().unwrap();
        assert_eq!(element_text(div), "Regional Qualifier");
    }

    #[test]
    fn column_key_folds_separators() {
        assert_eq!(column_key("Start Time"), "start_time");
        assert_eq!(column_key("start-time"), "start_time");
        assert_eq!(column_key(" Event  Type: "), "event_type");
        assert_eq!(column_key("match_record"), "match_record");
    }
}
