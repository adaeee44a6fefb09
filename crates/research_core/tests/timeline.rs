use research_core::timeline::{TOOL_OUTPUT_PREVIEW_CHARS, TRUNCATED_MARKER};
use research_core::{reduce_timeline, Event, EventKind, Timestamp};
use serde_json::json;

#[test]
fn timeline_keeps_operational_events_in_arrival_order() {
    let events = vec![
        Event::new(EventKind::Thought, json!("hidden")),
        Event::new(EventKind::ToolStart, json!({ "tool": "search", "args": { "q": "TSLA deliveries" } }))
            .with_timestamp(Timestamp::Number(3_600.0)),
        Event::new(EventKind::ToolEnd, json!({ "output": "42 results" })),
        Event::new(EventKind::Status, json!("Analysing")),
        Event::new(EventKind::Log, json!({ "message": "cache miss" })),
        Event::user_remark("ignored here"),
        Event::new(EventKind::Artifact, json!({ "type": "price_chart", "title": "TSLA 1Y", "data": [] })),
        Event::new(EventKind::Error, json!("rate limited")),
    ];

    let timeline = reduce_timeline(&events);
    let rows: Vec<(usize, &str, &str)> = timeline
        .iter()
        .map(|entry| (entry.seq, entry.kind.as_str(), entry.summary.as_str()))
        .collect();

    assert_eq!(
        rows,
        vec![
            (1, "tool_start", r#"search {"q":"TSLA deliveries"}"#),
            (2, "tool_end", "42 results"),
            (3, "status", "Analysing"),
            (4, "log", "cache miss"),
            (6, "artifact", "TSLA 1Y [price_chart]"),
            (7, "error", "rate limited"),
        ]
    );
    assert_eq!(timeline[0].time.as_deref(), Some("01:00:00"));
    assert_eq!(timeline[1].time, None);
}

#[test]
fn long_tool_output_is_truncated_with_marker() {
    let output = "x".repeat(TOOL_OUTPUT_PREVIEW_CHARS + 50);
    let events = vec![Event::new(EventKind::ToolEnd, json!(output))];

    let timeline = reduce_timeline(&events);
    let summary = &timeline[0].summary;

    assert!(summary.ends_with(TRUNCATED_MARKER));
    assert_eq!(
        summary.len(),
        TOOL_OUTPUT_PREVIEW_CHARS + TRUNCATED_MARKER.len()
    );
}

#[test]
fn structured_tool_output_is_stringified() {
    let events = vec![Event::new(
        EventKind::ToolEnd,
        json!({ "tool": "quote", "output": { "price": 101.5 } }),
    )];
    assert_eq!(reduce_timeline(&events)[0].summary, r#"{"price":101.5}"#);
}
