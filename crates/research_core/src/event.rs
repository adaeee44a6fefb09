use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::payload::{field, id_text, scalar_text, text_or_field, text_or_json};

/// Reserved task id for the planner's own activity on the plan board.
pub const PLANNING_TASK_ID: &str = "planning";

/// Event type tag. Unknown tags are preserved rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Thought,
    ToolStart,
    ToolEnd,
    Status,
    Log,
    Artifact,
    UserRemark,
    PlanUpdate,
    TaskUpdate,
    Error,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Thought => "thought",
            EventKind::ToolStart => "tool_start",
            EventKind::ToolEnd => "tool_end",
            EventKind::Status => "status",
            EventKind::Log => "log",
            EventKind::Artifact => "artifact",
            EventKind::UserRemark => "user_remark",
            EventKind::PlanUpdate => "plan_update",
            EventKind::TaskUpdate => "task_update",
            EventKind::Error => "error",
            EventKind::Other(tag) => tag,
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "thought" => EventKind::Thought,
            "tool_start" => EventKind::ToolStart,
            "tool_end" => EventKind::ToolEnd,
            "status" => EventKind::Status,
            "log" => EventKind::Log,
            "artifact" => EventKind::Artifact,
            "user_remark" => EventKind::UserRemark,
            "plan_update" => EventKind::PlanUpdate,
            "task_update" => EventKind::TaskUpdate,
            "error" => EventKind::Error,
            _ => EventKind::Other(tag),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded event time: epoch seconds/milliseconds, or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(f64),
    Text(String),
}

/// One record of the newline-delimited event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(
        default,
        rename = "taskId",
        alias = "task_id",
        deserialize_with = "deserialize_task_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed event line ({message}): {preview}")]
    Malformed { message: String, preview: String },
}

const PREVIEW_CHARS: usize = 80;

impl Event {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: None,
            task_id: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Synthetic remark echoed locally before the backend acknowledges it.
    pub fn user_remark(text: impl Into<String>) -> Self {
        Self::new(EventKind::UserRemark, Value::String(text.into()))
    }

    /// Parses one NDJSON line. The caller decides how to handle failures.
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        serde_json::from_str(line).map_err(|err| ParseError::Malformed {
            message: err.to_string(),
            preview: line.chars().take(PREVIEW_CHARS).collect(),
        })
    }

    pub fn thought_delta(&self) -> String {
        text_or_field(&self.payload, &["delta", "content", "text"]).unwrap_or_default()
    }

    pub fn tool_name(&self) -> String {
        text_or_field(&self.payload, &["tool", "name", "tool_name"])
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Tool arguments as compact JSON, when any were sent.
    pub fn tool_args(&self) -> Option<String> {
        field(&self.payload, &["args", "input", "arguments"]).map(|args| match args {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }

    pub fn tool_output(&self) -> String {
        text_or_json(&self.payload, &["output", "result", "content"]).unwrap_or_default()
    }

    /// Plain text for status, log, error and remark events.
    pub fn message_text(&self) -> String {
        text_or_json(
            &self.payload,
            &["message", "text", "content", "status", "error", "detail"],
        )
        .unwrap_or_default()
    }

    /// Splits an artifact payload into its type tag, title and data.
    pub fn artifact_parts(&self) -> (String, String, Value) {
        let kind = field(&self.payload, &["type", "kind", "artifact_type"])
            .and_then(scalar_text)
            .unwrap_or_else(|| "unknown".to_string());
        let title = field(&self.payload, &["title", "name"])
            .and_then(scalar_text)
            .unwrap_or_else(|| kind.clone());
        let data = field(&self.payload, &["data", "content"])
            .cloned()
            .unwrap_or_else(|| self.payload.clone());
        (kind, title, data)
    }

    /// Task id from the envelope, or from the payload when the envelope omits it.
    pub fn effective_task_id(&self) -> Option<String> {
        self.task_id
            .clone()
            .or_else(|| field(&self.payload, &["taskId", "task_id"]).and_then(id_text))
    }
}

fn deserialize_task_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_text))
}
