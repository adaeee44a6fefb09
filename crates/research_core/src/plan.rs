use std::collections::BTreeMap;

use serde_json::Value;

use crate::payload::{array_or_wrapped, field, id_text, scalar_text, text_or_field, text_or_json};
use crate::{Event, EventKind, PLANNING_TASK_ID};

/// Task lifecycle. Statuses only move forward; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// The status after observing `next`; regressions are ignored.
    pub fn advance(self, next: TaskStatus) -> TaskStatus {
        if !self.is_terminal() && next.rank() > self.rank() {
            next
        } else {
            self
        }
    }

    pub fn parse(raw: &str) -> Option<TaskStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "todo" => Some(TaskStatus::Pending),
            "in_progress" | "in-progress" | "running" | "active" => Some(TaskStatus::InProgress),
            "completed" | "complete" | "done" | "success" => Some(TaskStatus::Completed),
            "failed" | "error" | "cancelled" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub agent_type: String,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskUpdateKind {
    Thought,
    ToolCall,
    ToolResult,
    Output,
}

impl TaskUpdateKind {
    fn parse(raw: &str) -> TaskUpdateKind {
        match raw.trim().to_ascii_lowercase().as_str() {
            "thought" | "thinking" => TaskUpdateKind::Thought,
            "tool_call" | "tool_start" => TaskUpdateKind::ToolCall,
            "tool_result" | "tool_end" => TaskUpdateKind::ToolResult,
            _ => TaskUpdateKind::Output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStreamItem {
    pub seq: usize,
    pub task_id: Option<String>,
    pub kind: TaskUpdateKind,
    pub content: String,
}

impl TaskStreamItem {
    pub fn matches_focus(&self, focus: Option<&str>) -> bool {
        match (focus, self.task_id.as_deref()) {
            (Some(focus), task_id) => task_id == Some(focus),
            (None, None) => true,
            (None, Some(task_id)) => task_id == PLANNING_TASK_ID,
        }
    }
}

/// Index of the thought item that later same-task deltas extend.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenItem {
    task_id: Option<String>,
    index: usize,
}

/// Furthest status and latest result seen for a task id, across every plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct TaskMark {
    status: TaskStatus,
    result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanBoard {
    tasks: Vec<Task>,
    stream: Vec<TaskStreamItem>,
    open: Option<OpenItem>,
    marks: BTreeMap<String, TaskMark>,
}

impl PlanBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn stream(&self) -> &[TaskStreamItem] {
        &self.stream
    }

    pub fn apply(&mut self, seq: usize, event: &Event) {
        match event.kind {
            EventKind::PlanUpdate => self.replace_plan(&event.payload),
            EventKind::TaskUpdate => self.apply_task_update(seq, event),
            _ => {}
        }
    }

    fn replace_plan(&mut self, payload: &Value) {
        self.open = None;
        let mut incoming: Vec<Task> = array_or_wrapped(payload, &["tasks", "plan", "steps"])
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| parse_task(index, item))
                    .collect()
            })
            .unwrap_or_default();

        // A task dropped by one plan may come back in a later one.
        for task in &mut incoming {
            let mark = self.marks.entry(task.id.clone()).or_default();
            mark.status = mark.status.advance(task.status);
            task.status = mark.status;
            match &task.result {
                Some(result) => mark.result = Some(result.clone()),
                None => task.result = mark.result.clone(),
            }
        }
        self.tasks = incoming;
    }

    fn apply_task_update(&mut self, seq: usize, event: &Event) {
        let payload = &event.payload;
        let task_id = event.effective_task_id();
        let kind = field(payload, &["kind", "type", "update_type", "subtype"])
            .and_then(scalar_text)
            .map(|raw| TaskUpdateKind::parse(&raw))
            .unwrap_or(TaskUpdateKind::Output);
        let content = update_content(kind, payload);

        let open_index = self
            .open
            .as_ref()
            .filter(|open| kind == TaskUpdateKind::Thought && open.task_id == task_id)
            .map(|open| open.index);
        match open_index {
            Some(index) => self.stream[index].content.push_str(&content),
            None => {
                self.stream.push(TaskStreamItem {
                    seq,
                    task_id: task_id.clone(),
                    kind,
                    content: content.clone(),
                });
                self.open = (kind == TaskUpdateKind::Thought).then(|| OpenItem {
                    task_id: task_id.clone(),
                    index: self.stream.len() - 1,
                });
            }
        }

        let Some(task) = task_id
            .as_deref()
            .and_then(|id| self.tasks.iter_mut().find(|task| task.id == id))
        else {
            return;
        };
        let explicit = field(payload, &["status"])
            .and_then(scalar_text)
            .and_then(|raw| TaskStatus::parse(&raw));
        task.status = task
            .status
            .advance(TaskStatus::InProgress)
            .advance(explicit.unwrap_or(TaskStatus::InProgress));
        let result = field(payload, &["result"])
            .and_then(|result| text_or_json(result, &[]))
            .or_else(|| (kind == TaskUpdateKind::Output && !content.is_empty()).then_some(content));
        if result.is_some() {
            task.result = result;
        }
        let mark = self.marks.entry(task.id.clone()).or_default();
        mark.status = mark.status.advance(task.status);
        mark.result = task.result.clone();
    }
}

fn update_content(kind: TaskUpdateKind, payload: &Value) -> String {
    match kind {
        TaskUpdateKind::Thought => {
            text_or_field(payload, &["delta", "content", "text"]).unwrap_or_default()
        }
        TaskUpdateKind::ToolCall => {
            let tool = text_or_field(payload, &["tool", "name", "content"]).unwrap_or_default();
            match field(payload, &["args", "input", "arguments"]) {
                Some(Value::String(args)) => format!("{tool} {args}"),
                Some(args) => format!("{tool} {args}"),
                None => tool,
            }
        }
        TaskUpdateKind::ToolResult | TaskUpdateKind::Output => text_or_json(
            payload,
            &["content", "output", "result", "text", "delta", "message"],
        )
        .unwrap_or_default(),
    }
}

fn parse_task(index: usize, item: &Value) -> Option<Task> {
    if !item.is_object() {
        return None;
    }
    let id = field(item, &["id", "taskId", "task_id"])
        .and_then(id_text)
        .unwrap_or_else(|| format!("task-{}", index + 1));
    let title = field(item, &["title", "name"])
        .and_then(scalar_text)
        .unwrap_or_else(|| id.clone());
    Some(Task {
        title,
        description: field(item, &["description", "detail", "details"])
            .and_then(scalar_text)
            .unwrap_or_default(),
        status: field(item, &["status"])
            .and_then(scalar_text)
            .and_then(|raw| TaskStatus::parse(&raw))
            .unwrap_or_default(),
        agent_type: field(item, &["agentType", "agent_type", "agent"])
            .and_then(scalar_text)
            .unwrap_or_default(),
        result: field(item, &["result"]).and_then(|result| text_or_json(result, &[])),
        id,
    })
}

pub fn reduce_plan_board(events: &[Event]) -> PlanBoard {
    let mut board = PlanBoard::new();
    for (seq, event) in events.iter().enumerate() {
        board.apply(seq, event);
    }
    board
}
