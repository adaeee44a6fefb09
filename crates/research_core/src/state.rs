use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::artifact::ArtifactDispatcher;
use crate::log::EventLog;
use crate::payload::id_text;
use crate::plan::PlanBoard;
use crate::timeline::{timeline_entry, TimelineEntry};
use crate::transcript::TranscriptReducer;
use crate::view_model::AppViewModel;
use crate::Event;

pub type JobId = String;

/// Identifies one transport (live stream or history fetch). Results tagged
/// with anything but the open attempt are stale and dropped.
pub type StreamAttempt = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Starting | JobStatus::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Option<JobId>,
    pub query: String,
    pub status: JobStatus,
    pub created_at: Option<String>,
}

/// Job metadata as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(deserialize_with = "deserialize_job_id")]
    pub id: JobId,
    #[serde(default, deserialize_with = "deserialize_text_or_null")]
    pub query: String,
    #[serde(default, deserialize_with = "deserialize_text_or_null")]
    pub status: String,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl JobRecord {
    /// Whether the backend is still producing events for this job.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status.trim().to_ascii_lowercase().as_str(),
            "pending" | "queued" | "starting" | "running" | "in_progress"
        )
    }

    /// Status to show once the stored log has been replayed.
    pub fn terminal_status(&self) -> JobStatus {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "failed" | "error" | "cancelled" | "canceled" => JobStatus::Failed,
            _ => JobStatus::Completed,
        }
    }
}

/// Ids arrive as strings or bare numbers.
fn deserialize_job_id<'de, D>(deserializer: D) -> Result<JobId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_text(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid job id {value}")))
}

fn deserialize_text_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    job: Option<Job>,
    failure: Option<String>,
    log: EventLog,
    transcript: TranscriptReducer,
    plan: PlanBoard,
    timeline: Vec<TimelineEntry>,
    last_attempt: StreamAttempt,
    open_attempt: Option<StreamAttempt>,
    replay_status: Option<JobStatus>,
    history: Vec<JobRecord>,
    dispatcher: ArtifactDispatcher,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatcher(dispatcher: ArtifactDispatcher) -> Self {
        Self {
            dispatcher,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            job: self.job.clone(),
            status: self.status(),
            failure: self.failure.clone(),
            event_count: self.log.len(),
            transcript: self.transcript.messages(),
            timeline: self.timeline.clone(),
            tasks: self.plan.tasks().to_vec(),
            task_stream: self.plan.stream().to_vec(),
            history: self.history.clone(),
            streaming: self.transcript.has_open_message(),
            dirty: self.dirty,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.job.as_ref().map_or(JobStatus::Idle, |job| job.status)
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().and_then(|job| job.id.as_deref())
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn plan_board(&self) -> &PlanBoard {
        &self.plan
    }

    pub fn dispatcher(&self) -> &ArtifactDispatcher {
        &self.dispatcher
    }

    pub fn open_attempt(&self) -> Option<StreamAttempt> {
        self.open_attempt
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Discards the job, its log and every derived view.
    pub(crate) fn begin_job(&mut self, id: Option<JobId>, query: &str) {
        self.job = Some(Job {
            id,
            query: query.to_string(),
            status: JobStatus::Starting,
            created_at: None,
        });
        self.clear_views(Some(query));
        self.mark_dirty();
    }

    /// Back to `Starting` for the job already loaded, keeping its log and views.
    pub(crate) fn reopen_job(&mut self) {
        self.failure = None;
        self.replay_status = None;
        self.set_status(JobStatus::Starting);
        self.mark_dirty();
    }

    /// Re-seeds the transcript while the log is still empty.
    pub(crate) fn adopt_record(&mut self, record: &JobRecord) {
        if let Some(job) = self.job.as_mut() {
            job.query = record.query.clone();
            job.created_at = record.created_at.clone();
        }
        self.clear_views(Some(&record.query));
        self.mark_dirty();
    }

    fn clear_views(&mut self, seed_query: Option<&str>) {
        self.failure = None;
        self.log.clear();
        self.transcript = TranscriptReducer::new(seed_query);
        self.plan = PlanBoard::new();
        self.timeline.clear();
        self.replay_status = None;
    }

    pub(crate) fn job_mut(&mut self) -> Option<&mut Job> {
        self.job.as_mut()
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        if let Some(job) = self.job.as_mut() {
            if job.status != status {
                job.status = status;
                self.dirty = true;
            }
        }
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.open_attempt = None;
        self.failure = Some(error.into());
        self.set_status(JobStatus::Failed);
        self.mark_dirty();
    }

    /// Appends one event and reduces it into every view before returning.
    pub(crate) fn record_event(&mut self, event: Event) {
        let seq = self.log.append(event);
        let Some(event) = self.log.get(seq) else {
            return;
        };
        self.transcript.apply(seq, event, &self.dispatcher);
        self.plan.apply(seq, event);
        if let Some(entry) = timeline_entry(seq, event) {
            self.timeline.push(entry);
        }
        self.dirty = true;
    }

    pub(crate) fn issue_attempt(&mut self) -> StreamAttempt {
        self.last_attempt += 1;
        self.open_attempt = Some(self.last_attempt);
        self.last_attempt
    }

    pub(crate) fn is_open_attempt(&self, attempt: StreamAttempt) -> bool {
        self.open_attempt == Some(attempt)
    }

    /// Forgets the open attempt; returns whether there was one.
    pub(crate) fn close_attempt(&mut self) -> bool {
        self.open_attempt.take().is_some()
    }

    pub(crate) fn set_replay_status(&mut self, status: JobStatus) {
        self.replay_status = Some(status);
    }

    pub(crate) fn take_replay_status(&mut self) -> Option<JobStatus> {
        self.replay_status.take()
    }

    pub(crate) fn set_history(&mut self, history: Vec<JobRecord>) {
        self.history = history;
        self.mark_dirty();
    }

    /// Back to `Idle`. The attempt counter and job history survive.
    pub(crate) fn reset(&mut self) {
        self.job = None;
        self.open_attempt = None;
        self.clear_views(None);
        self.mark_dirty();
    }
}
