//! Nested match-history tables inside an event's detail region.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::locator::parse_static;
use super::text::element_text;

static TABLE: LazyLock<Selector> = LazyLock::new(|| parse_static("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| parse_static("tr"));
static TH: LazyLock<Selector> = LazyLock::new(|| parse_static("th"));
static CELL: LazyLock<Selector> = LazyLock::new(|| parse_static("th, td"));

static RECORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*").expect("valid record separator pattern"));

/// One row of a match results table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchRow {
    pub round: String,
    pub opponent: String,
    pub result: String,
    /// Cumulative win-loss record after this round.
    pub record: String,
}

/// Find the match table in a detail region and parse its rows.
///
/// The match table is the first table whose first row has at least two
/// header cells and which has more than one row. Metadata tables without a
/// two-column header are ignored.
pub fn parse_matches(region: ElementRef<'_>) -> Vec<MatchRow> {
    let Some(rows) = region.select(&TABLE).find_map(|table| {
        let rows: Vec<ElementRef<'_>> = table.select(&ROW).collect();
        let header_cells = rows.first().map(|r| r.select(&TH).count()).unwrap_or(0);
        (header_cells >= 2 && rows.len() > 1).then_some(rows)
    }) else {
        return Vec::new();
    };

    rows.iter().skip(1).filter_map(|row| parse_row(*row)).collect()
}

fn parse_row(row: ElementRef<'_>) -> Option<MatchRow> {
    let cells: Vec<String> = row.select(&CELL).map(element_text).collect();
    match cells.as_slice() {
        [] => None,
        // Stray caption rows span the table with a single non-numeric cell.
        [only] if !only.chars().any(|c| c.is_ascii_digit()) => None,
        _ => {
            let mut cells = cells.into_iter();
            Some(MatchRow {
                round: cells.next().unwrap_or_default(),
                opponent: cells.next().unwrap_or_default(),
                result: cells.next().unwrap_or_default(),
                record: cells.next().unwrap_or_default(),
            })
        }
    }
}

/// Normalize separator whitespace in a record value ("3 - 1" → "3-1").
pub fn normalize_record(record: &str) -> String {
    RECORD_SEPARATOR.replace_all(record.trim(), "-").into_owned()
}

/// The running record after the last parsed match, if any.
pub fn final_record(rows: &[MatchRow]) -> Option<String> {
    rows.last().map(|row| normalize_record(&row.record))
}
