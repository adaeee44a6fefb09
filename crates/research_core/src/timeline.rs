use chrono::{DateTime, Utc};

use crate::{Event, EventKind, Timestamp};

pub const TOOL_OUTPUT_PREVIEW_CHARS: usize = 200;
pub const TRUNCATED_MARKER: &str = "...[truncated]";

/// Epoch values above this are treated as milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub seq: usize,
    pub time: Option<String>,
    pub kind: EventKind,
    pub summary: String,
}

pub fn is_timeline_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Log
            | EventKind::ToolStart
            | EventKind::ToolEnd
            | EventKind::Status
            | EventKind::Artifact
            | EventKind::Error
    )
}

/// Summary line for one event, or `None` when the event is not part of the timeline.
pub fn timeline_entry(seq: usize, event: &Event) -> Option<TimelineEntry> {
    if !is_timeline_kind(&event.kind) {
        return None;
    }
    let summary = match event.kind {
        EventKind::ToolStart => match event.tool_args() {
            Some(args) => format!("{} {}", event.tool_name(), args),
            None => event.tool_name(),
        },
        EventKind::ToolEnd => truncate_preview(&event.tool_output(), TOOL_OUTPUT_PREVIEW_CHARS),
        EventKind::Artifact => {
            let (kind, title, _) = event.artifact_parts();
            format!("{title} [{kind}]")
        }
        _ => event.message_text(),
    };
    Some(TimelineEntry {
        seq,
        time: event.timestamp.as_ref().map(display_time),
        kind: event.kind.clone(),
        summary,
    })
}

pub fn reduce_timeline(events: &[Event]) -> Vec<TimelineEntry> {
    events
        .iter()
        .enumerate()
        .filter_map(|(seq, event)| timeline_entry(seq, event))
        .collect()
}

/// Cuts `text` to at most `max_chars` characters and marks the cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}{TRUNCATED_MARKER}", &text[..end]),
        None => text.to_string(),
    }
}

/// `HH:MM:SS` in UTC when the timestamp is understood, the raw text otherwise.
pub fn display_time(timestamp: &Timestamp) -> String {
    match timestamp {
        Timestamp::Number(value) => {
            let millis = if value.abs() >= MILLIS_THRESHOLD {
                *value
            } else {
                value * 1000.0
            };
            DateTime::<Utc>::from_timestamp_millis(millis as i64)
                .map(|time| time.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| value.to_string())
        }
        Timestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|time| time.with_timezone(&Utc).format("%H:%M:%S").to_string())
            .unwrap_or_else(|_| text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::{display_time, truncate_preview, TRUNCATED_MARKER};
    use crate::Timestamp;

    #[test]
    fn short_output_kept_as_is() {
        assert_eq!(truncate_preview("42 results", 200), "42 results");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(205);
        let preview = truncate_preview(&text, 200);
        assert!(preview.ends_with(TRUNCATED_MARKER));
        assert_eq!(preview.chars().count(), 200 + TRUNCATED_MARKER.chars().count());
    }

    #[test]
    fn epoch_seconds_and_millis_agree() {
        assert_eq!(display_time(&Timestamp::Number(3_723.0)), "01:02:03");
        assert_eq!(display_time(&Timestamp::Number(1_700_000_000_000.0)), "22:13:20");
        assert_eq!(display_time(&Timestamp::Number(1_700_000_000.0)), "22:13:20");
    }

    #[test]
    fn text_timestamps() {
        assert_eq!(
            display_time(&Timestamp::Text("2024-05-01T09:30:00+02:00".to_string())),
            "07:30:00"
        );
        assert_eq!(display_time(&Timestamp::Text("just now".to_string())), "just now");
    }
}
