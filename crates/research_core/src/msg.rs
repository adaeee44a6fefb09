use crate::{Event, JobId, JobRecord, StreamAttempt};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Process start; carries the job id persisted by a previous run, if any.
    AppStarted { persisted_job_id: Option<JobId> },
    /// User asked for a new research job.
    StartRequested(String),
    /// Backend accepted the job and assigned an identifier.
    JobCreated {
        attempt: StreamAttempt,
        job_id: JobId,
        created_at: Option<String>,
    },
    /// Job creation request failed.
    JobCreationFailed {
        attempt: StreamAttempt,
        error: String,
    },
    /// Reattach to (or replay) an existing job.
    RestoreRequested(JobId),
    /// Metadata for the job being restored.
    JobLoaded(JobRecord),
    /// Metadata lookup for the job being restored failed.
    JobLoadFailed { job_id: JobId, error: String },
    /// Stored log of a finished job, delivered in one batch.
    HistoryLoaded {
        attempt: StreamAttempt,
        events: Vec<Event>,
    },
    /// The live stream responded and is delivering events.
    StreamAttached { attempt: StreamAttempt },
    /// One parsed event from the live stream.
    StreamEvent {
        attempt: StreamAttempt,
        event: Event,
    },
    /// The live stream ended normally.
    StreamClosed { attempt: StreamAttempt },
    /// The live stream or history fetch failed.
    StreamFailed {
        attempt: StreamAttempt,
        error: String,
    },
    /// User typed a remark for the running job.
    RemarkSubmitted(String),
    /// User asked for a new session.
    ResetRequested,
    /// User asked for the list of past jobs.
    HistoryRequested,
    /// Past jobs as reported by the backend.
    JobsListed(Vec<JobRecord>),
    /// Listing past jobs failed.
    JobsListFailed(String),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
