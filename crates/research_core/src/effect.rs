use crate::{JobId, StreamAttempt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The reply is tagged with `attempt`, which the stream then reuses.
    CreateJob { query: String, attempt: StreamAttempt },
    LoadJob { job_id: JobId },
    OpenStream { job_id: JobId, attempt: StreamAttempt },
    FetchHistory { job_id: JobId, attempt: StreamAttempt },
    /// Cancel whatever transport is open. Its reader stops and drops buffered text.
    CancelStream,
    SendRemark { job_id: JobId, text: String },
    PersistActiveJob { job_id: JobId },
    ClearPersistedJob,
    ListJobs,
}
