use crate::plan::{Task, TaskStreamItem};
use crate::timeline::TimelineEntry;
use crate::transcript::Message;
use crate::{Job, JobRecord, JobStatus};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub job: Option<Job>,
    pub status: JobStatus,
    /// Terminal failure indicator shown alongside the retained views.
    pub failure: Option<String>,
    pub event_count: usize,
    pub transcript: Vec<Message>,
    pub timeline: Vec<TimelineEntry>,
    pub tasks: Vec<Task>,
    pub task_stream: Vec<TaskStreamItem>,
    pub history: Vec<JobRecord>,
    /// The last transcript message is assistant text still being streamed.
    pub streaming: bool,
    pub dirty: bool,
}

impl AppViewModel {
    pub fn is_loading(&self) -> bool {
        self.status.is_active()
    }

    /// Stream items for the focused task, or planner-level items when unfocused.
    pub fn task_stream_for(&self, focus: Option<&str>) -> Vec<&TaskStreamItem> {
        self.task_stream
            .iter()
            .filter(|item| item.matches_focus(focus))
            .collect()
    }
}
