//! Record container discovery.
//!
//! Strategies run in a fixed priority and the first one with rows wins:
//! tables, then `role="row"` grids, then a list of known item selectors.
//! Nothing found is not an error; the result is an empty `Unknown`
//! container.

use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::text::element_text;
use super::ExtractionMode;

static TABLE: LazyLock<Selector> = LazyLock::new(|| parse_static("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| parse_static("tr"));
static THEAD_TH: LazyLock<Selector> = LazyLock::new(|| parse_static("thead th"));
static TH: LazyLock<Selector> = LazyLock::new(|| parse_static("th"));
static ROLE_ROW: LazyLock<Selector> = LazyLock::new(|| parse_static(r#"[role="row"]"#));
static ROLE_CELL: LazyLock<Selector> =
    LazyLock::new(|| parse_static(r#"[role="cell"], [role="gridcell"]"#));
static ROLE_COLUMNHEADER: LazyLock<Selector> =
    LazyLock::new(|| parse_static(r#"[role="columnheader"]"#));

/// Parse a selector literal known to be valid.
pub(crate) fn parse_static(selector: &'static str) -> Selector {
    match Selector::parse(selector) {
        Ok(s) => s,
        Err(e) => panic!("invalid built-in selector {:?}: {}", selector, e),
    }
}

/// Item selectors for generic history markup, in priority order.
const GENERIC_LIST_SELECTORS: &[&str] = &[
    "[data-history-item]",
    ".history-item",
    ".history-row",
    ".transaction-row",
    ".profile-history-item",
    "main li",
];

/// Item selectors for event-block history markup, in priority order.
const EVENT_LIST_SELECTORS: &[&str] = &[
    "[data-event-id]",
    ".event",
    ".history-event",
    ".event-block",
];

/// Tables inside an element matching this are per-record detail tables.
const EVENT_BLOCK_SELECTOR: &str = "[data-event-id], .event, .history-event, .event-block";

/// Which list selectors to try and which tables belong to records.
#[derive(Debug, Clone)]
pub struct LocatorProfile {
    list_selectors: Vec<Selector>,
    record_block: Option<Selector>,
}

impl LocatorProfile {
    pub fn for_mode(mode: ExtractionMode) -> Self {
        match mode {
            ExtractionMode::Generic => Self::generic(),
            ExtractionMode::Events => Self::events(),
        }
    }

    pub fn generic() -> Self {
        Self {
            list_selectors: GENERIC_LIST_SELECTORS.iter().copied().map(parse_static).collect(),
            record_block: None,
        }
    }

    pub fn events() -> Self {
        Self {
            list_selectors: EVENT_LIST_SELECTORS.iter().copied().map(parse_static).collect(),
            record_block: Some(parse_static(EVENT_BLOCK_SELECTOR)),
        }
    }

    /// Whether the element sits inside a record block.
    fn is_nested_in_record(&self, element: ElementRef<'_>) -> bool {
        let Some(ref block) = self.record_block else {
            return false;
        };
        element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| block.matches(&ancestor))
    }
}

/// Kind of container the locator settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Table,
    RoleGrid,
    List,
    Unknown,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Table => "table",
            ContainerKind::RoleGrid => "role_grid",
            ContainerKind::List => "list",
            ContainerKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The located record collection. Built fresh on every scan and borrowed
/// from the parsed document.
#[derive(Debug, Clone)]
pub enum ContainerDescriptor<'a> {
    Table {
        headers: Vec<String>,
        rows: Vec<ElementRef<'a>>,
        /// Set when the headers were read from the first body row.
        header_row: Option<ElementRef<'a>>,
    },
    RoleGrid {
        headers: Vec<String>,
        rows: Vec<ElementRef<'a>>,
    },
    List {
        rows: Vec<ElementRef<'a>>,
    },
    Unknown,
}

impl<'a> ContainerDescriptor<'a> {
    pub fn kind(&self) -> ContainerKind {
        match self {
            ContainerDescriptor::Table { .. } => ContainerKind::Table,
            ContainerDescriptor::RoleGrid { .. } => ContainerKind::RoleGrid,
            ContainerDescriptor::List { .. } => ContainerKind::List,
            ContainerDescriptor::Unknown => ContainerKind::Unknown,
        }
    }

    /// Header labels; empty for lists and unknown containers.
    pub fn headers(&self) -> &[String] {
        match self {
            ContainerDescriptor::Table { headers, .. }
            | ContainerDescriptor::RoleGrid { headers, .. } => headers,
            ContainerDescriptor::List { .. } | ContainerDescriptor::Unknown => &[],
        }
    }

    pub fn rows(&self) -> &[ElementRef<'a>] {
        match self {
            ContainerDescriptor::Table { rows, .. }
            | ContainerDescriptor::RoleGrid { rows, .. }
            | ContainerDescriptor::List { rows } => rows,
            ContainerDescriptor::Unknown => &[],
        }
    }

    pub fn count(&self) -> usize {
        self.rows().len()
    }

    /// Rows that carry records (a header row read from the body is skipped).
    pub fn data_rows(&self) -> Vec<ElementRef<'a>> {
        match self {
            ContainerDescriptor::Table {
                rows,
                header_row: Some(header),
                ..
            } => rows.iter().filter(|r| r.id() != header.id()).copied().collect(),
            _ => self.rows().to_vec(),
        }
    }
}

/// Pick the highest-scoring candidate with a positive score.
///
/// Only a strictly greater score replaces the current best, so the first
/// candidate wins exact ties.
pub fn best_candidate<T, I, F>(candidates: I, score: F) -> Option<(T, usize)>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> usize,
{
    let mut best: Option<(T, usize)> = None;
    for candidate in candidates {
        let s = score(&candidate);
        if s > best.as_ref().map(|(_, b)| *b).unwrap_or(0) {
            best = Some((candidate, s));
        }
    }
    best
}

/// Find the most likely record container in a document.
pub fn locate<'a>(document: &'a Html, profile: &LocatorProfile) -> ContainerDescriptor<'a> {
    if let Some(table) = locate_table(document, profile) {
        return table;
    }
    if let Some(grid) = locate_role_grid(document) {
        return grid;
    }
    if let Some(list) = locate_list(document, profile) {
        return list;
    }
    ContainerDescriptor::Unknown
}

/// Rows of a table's first `tbody`, or of the whole table without one.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let body = table
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "tbody")
        .unwrap_or(table);
    body.select(&ROW).collect()
}

fn locate_table<'a>(document: &'a Html, profile: &LocatorProfile) -> Option<ContainerDescriptor<'a>> {
    let candidates = document
        .select(&TABLE)
        .filter(|table| !profile.is_nested_in_record(*table))
        .map(|table| (table, table_rows(table)));

    let ((table, rows), _) = best_candidate(candidates, |(_, rows)| rows.len())?;

    let mut headers: Vec<String> = table.select(&THEAD_TH).map(element_text).collect();
    let mut header_row = None;
    if headers.is_empty() {
        if let Some(first) = rows.first() {
            headers = first.select(&TH).map(element_text).collect();
            if !headers.is_empty() {
                header_row = Some(*first);
            }
        }
    }

    Some(ContainerDescriptor::Table {
        headers,
        rows,
        header_row,
    })
}

fn locate_role_grid(document: &Html) -> Option<ContainerDescriptor<'_>> {
    let rows: Vec<ElementRef<'_>> = document
        .select(&ROLE_ROW)
        .filter(|row| row.select(&ROLE_CELL).next().is_some())
        .collect();
    if rows.is_empty() {
        return None;
    }
    let headers = document.select(&ROLE_COLUMNHEADER).map(element_text).collect();
    Some(ContainerDescriptor::RoleGrid { headers, rows })
}

fn locate_list<'a>(document: &'a Html, profile: &LocatorProfile) -> Option<ContainerDescriptor<'a>> {
    let candidates = profile.list_selectors.iter().map(|selector| {
        document
            .select(selector)
            .filter(|item| !element_text(*item).is_empty())
            .collect::<Vec<_>>()
    });
    let (rows, _) = best_candidate(candidates, |items| items.len())?;
    Some(ContainerDescriptor::List { rows })
}
