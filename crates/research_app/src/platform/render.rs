use research_core::{
    AppViewModel, ArtifactBody, ArtifactView, JobStatus, Message, Role, Task, TaskStatus,
    TimelineEntry,
};

const MAX_TABLE_ROWS: usize = 20;

/// Turns successive views into terminal lines, printing each finished
/// message and timeline entry once.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    messages_printed: usize,
    timeline_printed: usize,
    last_status: Option<JobStatus>,
    last_board: Vec<(String, TaskStatus)>,
    history_printed: bool,
    show_timeline: bool,
}

impl TerminalRenderer {
    pub fn new(show_timeline: bool) -> Self {
        Self {
            show_timeline,
            ..Self::default()
        }
    }

    pub fn render(&mut self, view: &AppViewModel) -> Vec<String> {
        let mut lines = Vec::new();

        // A reset shrinks the views; start over.
        if view.transcript.len() < self.messages_printed {
            self.messages_printed = 0;
        }
        if view.timeline.len() < self.timeline_printed {
            self.timeline_printed = 0;
        }

        if self.last_status != Some(view.status) {
            self.last_status = Some(view.status);
            lines.push(status_line(view));
        }

        let board: Vec<(String, TaskStatus)> = view
            .tasks
            .iter()
            .map(|task| (task.id.clone(), task.status))
            .collect();
        if board != self.last_board {
            if !view.tasks.is_empty() {
                lines.push("Plan:".to_string());
                lines.extend(view.tasks.iter().map(task_line));
            }
            self.last_board = board;
        }

        if self.show_timeline {
            for entry in &view.timeline[self.timeline_printed..] {
                lines.push(timeline_line(entry));
            }
        }
        self.timeline_printed = view.timeline.len();

        // The open message may still grow until a flush or the job ends.
        let settled = if view.streaming && !view.status.is_terminal() {
            view.transcript.len().saturating_sub(1)
        } else {
            view.transcript.len()
        };
        if settled > self.messages_printed {
            for message in &view.transcript[self.messages_printed..settled] {
                lines.extend(message_lines(message));
            }
            self.messages_printed = settled;
        }

        if !view.history.is_empty() && !self.history_printed {
            self.history_printed = true;
            lines.push("Past jobs:".to_string());
            lines.extend(view.history.iter().map(|record| {
                format!(
                    "  {}  [{}]  {}{}",
                    record.id,
                    record.status,
                    record.query,
                    record
                        .created_at
                        .as_deref()
                        .map(|created| format!("  ({created})"))
                        .unwrap_or_default()
                )
            }));
        }

        lines
    }
}

fn status_line(view: &AppViewModel) -> String {
    let label = match view.status {
        JobStatus::Idle => "idle",
        JobStatus::Starting => "starting",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    };
    let job = view
        .job
        .as_ref()
        .and_then(|job| job.id.as_deref())
        .map(|id| format!(" ({id})"))
        .unwrap_or_default();
    match (&view.failure, view.status) {
        (Some(failure), JobStatus::Failed) => format!("== job{job} {label}: {failure}"),
        _ => format!("== job{job} {label}"),
    }
}

fn task_line(task: &Task) -> String {
    let mark = match task.status {
        TaskStatus::Pending => " ",
        TaskStatus::InProgress => ">",
        TaskStatus::Completed => "x",
        TaskStatus::Failed => "!",
    };
    let agent = if task.agent_type.is_empty() {
        String::new()
    } else {
        format!(" <{}>", task.agent_type)
    };
    format!("  [{mark}] {} {}{agent}", task.id, task.title)
}

fn timeline_line(entry: &TimelineEntry) -> String {
    format!(
        "  . {} {:<10} {}",
        entry.time.as_deref().unwrap_or("--:--:--"),
        entry.kind.as_str(),
        entry.summary
    )
}

pub fn message_lines(message: &Message) -> Vec<String> {
    let speaker = match (message.role, message.feedback) {
        (Role::User, true) => "you (remark)",
        (Role::User, false) => "you",
        (Role::Assistant, _) => "agent",
        (Role::System, _) => "system",
        (Role::Artifact, _) => "artifact",
    };
    let mut lines = Vec::new();
    if let Some(content) = &message.content {
        let task = message
            .task_id
            .as_deref()
            .map(|id| format!(" [{id}]"))
            .unwrap_or_default();
        lines.push(format!("{speaker}{task}: {content}"));
    }
    if let Some(artifact) = &message.artifact {
        lines.extend(artifact_lines(&artifact.view));
    }
    lines
}

pub fn artifact_lines(view: &ArtifactView) -> Vec<String> {
    let title = if view.title.is_empty() {
        view.kind.clone()
    } else {
        format!("{} ({})", view.title, view.kind)
    };
    let mut lines = vec![format!("# {title}")];
    match &view.body {
        ArtifactBody::PriceSeries(points) => {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                let low = points.iter().map(|p| p.close).fold(f64::INFINITY, f64::min);
                let high = points
                    .iter()
                    .map(|p| p.close)
                    .fold(f64::NEG_INFINITY, f64::max);
                lines.push(format!(
                    "  {} points, {} {:.2} -> {} {:.2} (low {:.2}, high {:.2})",
                    points.len(),
                    first.date,
                    first.close,
                    last.date,
                    last.close,
                    low,
                    high
                ));
            }
        }
        ArtifactBody::Table { columns, rows } => {
            if !columns.is_empty() {
                lines.push(format!("  {}", columns.join(" | ")));
            }
            for row in rows.iter().take(MAX_TABLE_ROWS) {
                lines.push(format!("  {}", row.join(" | ")));
            }
            if rows.len() > MAX_TABLE_ROWS {
                lines.push(format!("  ... {} more rows", rows.len() - MAX_TABLE_ROWS));
            }
        }
        ArtifactBody::Metrics(entries) => {
            lines.extend(
                entries
                    .iter()
                    .map(|entry| format!("  {}: {}", entry.label, entry.value)),
            );
        }
        ArtifactBody::News(items) => {
            for item in items {
                let mut line = format!("  - {}", item.headline);
                if let Some(source) = &item.source {
                    line.push_str(&format!(" ({source})"));
                }
                if let Some(url) = &item.url {
                    line.push_str(&format!(" {url}"));
                }
                lines.push(line);
            }
        }
        ArtifactBody::Empty => lines.push("  (no data)".to_string()),
        ArtifactBody::Raw(text) => lines.extend(text.lines().map(|line| format!("  {line}"))),
    }
    lines
}
