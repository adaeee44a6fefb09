use serde_json::Value;

use crate::artifact::{ArtifactDispatcher, ArtifactView};
use crate::{Event, EventKind};

pub const SEED_MESSAGE_ID: &str = "seed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Artifact,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactMessage {
    pub data: Value,
    pub view: ArtifactView,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: Option<String>,
    pub artifact: Option<ArtifactMessage>,
    pub task_id: Option<String>,
    /// Set on user remarks sent while the job was running.
    pub feedback: bool,
}

impl Message {
    fn text(id: String, role: Role, content: String, task_id: Option<String>) -> Self {
        Self {
            id,
            role,
            content: Some(content),
            artifact: None,
            task_id,
            feedback: false,
        }
    }
}

/// The assistant text still being streamed.
#[derive(Debug, Clone, PartialEq)]
struct OpenMessage {
    first_seq: usize,
    task_id: Option<String>,
    text: String,
}

impl OpenMessage {
    fn into_message(self) -> Option<Message> {
        if self.text.is_empty() {
            return None;
        }
        Some(Message::text(
            message_id(self.first_seq),
            Role::Assistant,
            self.text,
            self.task_id,
        ))
    }
}

fn message_id(seq: usize) -> String {
    format!("m{seq}")
}

/// Incremental transcript fold. Thought deltas coalesce globally until any
/// other event kind flushes them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptReducer {
    messages: Vec<Message>,
    open: Option<OpenMessage>,
}

impl TranscriptReducer {
    pub fn new(seed_query: Option<&str>) -> Self {
        let mut reducer = Self::default();
        if let Some(query) = seed_query.map(str::trim).filter(|query| !query.is_empty()) {
            reducer.messages.push(Message::text(
                SEED_MESSAGE_ID.to_string(),
                Role::User,
                query.to_string(),
                None,
            ));
        }
        reducer
    }

    pub fn apply(&mut self, seq: usize, event: &Event, dispatcher: &ArtifactDispatcher) {
        if event.kind == EventKind::Thought {
            let delta = event.thought_delta();
            match self.open.as_mut() {
                Some(open) => open.text.push_str(&delta),
                None => {
                    self.open = Some(OpenMessage {
                        first_seq: seq,
                        task_id: event.task_id.clone(),
                        text: delta,
                    });
                }
            }
            return;
        }

        self.flush();
        let id = message_id(seq);
        let task_id = event.task_id.clone();
        match &event.kind {
            EventKind::ToolStart => self.messages.push(Message::text(
                id,
                Role::System,
                format!("Using tool: {}", event.tool_name()),
                task_id,
            )),
            EventKind::UserRemark => {
                let mut message = Message::text(id, Role::User, event.message_text(), task_id);
                message.feedback = true;
                self.messages.push(message);
            }
            EventKind::Artifact => {
                let (kind, title, data) = event.artifact_parts();
                let view = dispatcher.dispatch(&kind, &title, &data);
                self.messages.push(Message {
                    id,
                    role: Role::Artifact,
                    content: None,
                    artifact: Some(ArtifactMessage { data, view }),
                    task_id,
                    feedback: false,
                });
            }
            EventKind::Error => self.messages.push(Message::text(
                id,
                Role::System,
                format!("Error: {}", event.message_text()),
                task_id,
            )),
            // tool_end and the rest only flush.
            _ => {}
        }
    }

    fn flush(&mut self) {
        if let Some(message) = self.open.take().and_then(OpenMessage::into_message) {
            self.messages.push(message);
        }
    }

    pub fn has_open_message(&self) -> bool {
        self.open.as_ref().is_some_and(|open| !open.text.is_empty())
    }

    /// Messages including the still-open assistant text, as the end of the
    /// consumed prefix would flush it.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = self.messages.clone();
        if let Some(message) = self.open.clone().and_then(OpenMessage::into_message) {
            messages.push(message);
        }
        messages
    }

    pub fn finish(mut self) -> Vec<Message> {
        self.flush();
        self.messages
    }
}

/// Pure fold of a whole event prefix into a transcript.
pub fn reduce_transcript(
    events: &[Event],
    seed_query: Option<&str>,
    dispatcher: &ArtifactDispatcher,
) -> Vec<Message> {
    let mut reducer = TranscriptReducer::new(seed_query);
    for (seq, event) in events.iter().enumerate() {
        reducer.apply(seq, event, dispatcher);
    }
    reducer.finish()
}
