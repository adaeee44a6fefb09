use std::time::Duration;

use research_core::{Event, JobId, JobRecord, StreamAttempt};

/// Results reported by the engine worker, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    JobCreated {
        attempt: StreamAttempt,
        job_id: JobId,
        created_at: Option<String>,
    },
    JobCreationFailed {
        attempt: StreamAttempt,
        error: ApiError,
    },
    JobLoaded(JobRecord),
    JobLoadFailed {
        job_id: JobId,
        error: ApiError,
    },
    HistoryLoaded {
        attempt: StreamAttempt,
        events: Vec<Event>,
    },
    StreamAttached {
        attempt: StreamAttempt,
    },
    StreamEvent {
        attempt: StreamAttempt,
        event: Event,
    },
    StreamClosed {
        attempt: StreamAttempt,
    },
    StreamFailed {
        attempt: StreamAttempt,
        error: TransportError,
    },
    RemarkFailed {
        job_id: JobId,
        error: ApiError,
    },
    JobsListed(Vec<JobRecord>),
    JobsListFailed {
        error: ApiError,
    },
}

/// Job identifier handed out by the creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: JobId,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {status}")]
    HttpStatus { status: u16 },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Failure of the live transport. Already delivered events stay delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("stream read failed: {0}")]
    Io(String),
    #[error("no event received for {0:?}")]
    Silence(Duration),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// How a stream ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Closed,
    /// Stopped on request; not a failure and never reported as one.
    Cancelled,
}
