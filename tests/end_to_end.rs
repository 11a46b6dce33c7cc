//! Document-to-CSV scenarios through the public API.

use gemharvest::history::csv::parse_rows;
use gemharvest::history::ContainerKind;
use gemharvest::loader::HarvestContext;
use gemharvest::output::{FileSink, OutputSink};
use gemharvest::{extract_document, ExtractionMode};

const EVENT_HISTORY: &str = r#"<!doctype html>
<html><body>
  <header><nav><a href="/">Home</a></nav></header>
  <main>
    <h1>Event history</h1>
    <div class="event" data-event-id="7781">
      <h4 class="event__title">Regional Qualifier</h4>
      <div class="event__meta">
        <span class="event__meta-item">18:00</span>
        <span class="event__meta-item">Store X</span>
        <span class="event__meta-item">Tournament</span>
        <span class="event__meta-item">Classic Constructed</span>
      </div>
      <div class="event__extra-details">
        <table>
          <tr><th>Round</th><th>Opponent</th><th>Result</th><th>Record</th></tr>
          <tr><td>1</td><td>Alice</td><td>Win</td><td>1-0</td></tr>
          <tr><td>2</td><td>Bob</td><td>Loss</td><td>1-1</td></tr>
        </table>
      </div>
    </div>
  </main>
</body></html>"#;

#[test]
fn regional_qualifier_exports_one_event_row() {
    let batch = extract_document(EVENT_HISTORY, ExtractionMode::Events);
    assert_eq!(batch.kind, ContainerKind::List);

    let context = HarvestContext::detached("events");
    assert_eq!(context.merge(batch).unwrap(), 1);

    let csv = context.render_csv();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "title,start_time,store,event_type,format,match_record",
            "Regional Qualifier,18:00,Store X,Tournament,Classic Constructed,1-1",
        ]
    );
}

#[test]
fn rescanning_the_same_document_adds_nothing() {
    let context = HarvestContext::detached("rescan");
    for _ in 0..3 {
        context
            .merge(extract_document(EVENT_HISTORY, ExtractionMode::Events))
            .unwrap();
    }
    assert_eq!(context.len(), 1);
}

#[test]
fn role_grid_values_with_commas_are_quoted() {
    let html = r#"<html><body><div role="grid">
        <div role="row">
          <span role="columnheader">Date</span><span role="columnheader">Note</span>
        </div>
        <div role="row"><span role="cell">2024-02-01</span><span role="cell">Won 2, lost 1</span></div>
        <div role="row"><span role="cell">2024-02-08</span><span role="cell">Said "gg"</span></div>
    </div></body></html>"#;

    let batch = extract_document(html, ExtractionMode::Generic);
    assert_eq!(batch.kind, ContainerKind::RoleGrid);

    let context = HarvestContext::detached("grid");
    context.merge(batch).unwrap();
    let csv = context.render_csv();
    assert_eq!(
        csv,
        "Date,Note\n2024-02-01,\"Won 2, lost 1\"\n2024-02-08,\"Said \"\"gg\"\"\""
    );

    let rows = parse_rows(&csv);
    assert_eq!(rows[1], vec!["2024-02-01", "Won 2, lost 1"]);
    assert_eq!(rows[2], vec!["2024-02-08", "Said \"gg\""]);
}

#[test]
fn file_sink_writes_rendered_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("history.csv");

    let context = HarvestContext::detached("file");
    context
        .merge(extract_document(EVENT_HISTORY, ExtractionMode::Events))
        .unwrap();

    let mut sink = FileSink::new(&path);
    let written = sink.write(&context.schema(), &context.records()).unwrap();
    assert_eq!(written, 1);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, context.render_csv());
}

#[test]
fn document_without_history_exports_header_only() {
    let html = "<html><body><p>Nothing here yet.</p></body></html>";
    let batch = extract_document(html, ExtractionMode::Events);
    assert_eq!(batch.kind, ContainerKind::Unknown);

    let context = HarvestContext::detached("empty");
    context.merge(batch).unwrap();
    assert_eq!(
        context.render_csv(),
        "title,start_time,store,event_type,format,match_record"
    );
}
