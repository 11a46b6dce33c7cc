//! CSV rendering of harvested records.

use std::mem::take;

use super::{Record, Schema};

/// Whether a value must be quoted.
fn needs_quotes(value: &str) -> bool {
    value.contains(',') || value.contains('"') || value.contains('\n')
}

/// Escape a single CSV value.
pub fn escape(value: &str) -> String {
    if needs_quotes(value) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Record columns already match the schema one-to-one (duplicate header
/// names stay positional).
fn is_aligned(record: &Record, schema: &Schema) -> bool {
    record.fields().len() == schema.len()
        && record
            .fields()
            .iter()
            .zip(schema.columns())
            .all(|((name, _), column)| name == column)
}

fn render_line<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.map(escape).collect::<Vec<_>>().join(",")
}

/// Render records as CSV: a header line in schema order, then one line per
/// record. Values are looked up by column name and default to empty.
/// Lines are joined with `\n` and there is no trailing newline.
pub fn render(schema: &Schema, records: &[Record]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(render_line(schema.columns().iter().map(String::as_str)));
    for record in records {
        if is_aligned(record, schema) {
            lines.push(render_line(record.values()));
        } else {
            lines.push(render_line(
                schema
                    .columns()
                    .iter()
                    .map(|column| record.get(column).unwrap_or("")),
            ));
        }
    }
    lines.join("\n")
}

/// Parse CSV text back into rows (quotes and doubled quotes understood).
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' if !in_quotes => {
                row.push(take(&mut field));
                rows.push(take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    if !text.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
