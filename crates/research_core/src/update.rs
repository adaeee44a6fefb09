use research_logging::{research_debug, research_warn};

use crate::{AppState, Effect, Event, JobId, JobStatus, Msg, StreamAttempt};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::AppStarted { persisted_job_id } => match persisted_job_id {
            Some(job_id) => restore(&mut state, job_id),
            None => Vec::new(),
        },
        Msg::StartRequested(query) => {
            let query = query.trim();
            if query.is_empty() {
                return (state, Vec::new());
            }
            if state.status() != JobStatus::Idle {
                research_debug!("start ignored while {:?}", state.status());
                return (state, Vec::new());
            }
            let mut effects = Vec::with_capacity(2);
            if state.close_attempt() {
                effects.push(Effect::CancelStream);
            }
            state.begin_job(None, query);
            let attempt = state.issue_attempt();
            effects.push(Effect::CreateJob {
                query: query.to_string(),
                attempt,
            });
            effects
        }
        Msg::JobCreated {
            attempt,
            job_id,
            created_at,
        } => {
            let awaiting_id = state.status() == JobStatus::Starting && state.job_id().is_none();
            if !accepts(&state, attempt) || !awaiting_id {
                research_debug!("ignoring job id {} nobody asked for", job_id);
                return (state, Vec::new());
            }
            if let Some(job) = state.job_mut() {
                job.id = Some(job_id.clone());
                job.created_at = created_at;
            }
            state.mark_dirty();
            vec![
                Effect::PersistActiveJob {
                    job_id: job_id.clone(),
                },
                Effect::OpenStream { job_id, attempt },
            ]
        }
        Msg::JobCreationFailed { attempt, error } => {
            if accepts(&state, attempt)
                && state.status() == JobStatus::Starting
                && state.job_id().is_none()
            {
                state.fail(error);
            }
            Vec::new()
        }
        Msg::RestoreRequested(job_id) => restore(&mut state, job_id),
        Msg::JobLoaded(record) => {
            let restoring = state.status() == JobStatus::Starting
                && state.open_attempt().is_none()
                && state.job_id() == Some(record.id.as_str());
            if !restoring {
                research_debug!("ignoring metadata for job {}", record.id);
                return (state, Vec::new());
            }
            // Reattaching a live job keeps what this session already received.
            let keep_views = record.is_active() && !state.log().is_empty();
            if !keep_views {
                state.adopt_record(&record);
            }
            let attempt = state.issue_attempt();
            let job_id = record.id.clone();
            if record.is_active() {
                vec![Effect::OpenStream { job_id, attempt }]
            } else {
                state.set_replay_status(record.terminal_status());
                vec![Effect::FetchHistory { job_id, attempt }]
            }
        }
        Msg::JobLoadFailed { job_id, error } => {
            if state.status() == JobStatus::Starting && state.job_id() == Some(job_id.as_str()) {
                state.fail(error);
            }
            Vec::new()
        }
        Msg::HistoryLoaded { attempt, events } => {
            if !accepts(&state, attempt) {
                return (state, Vec::new());
            }
            state.close_attempt();
            for event in events {
                state.record_event(event);
            }
            match state.take_replay_status().unwrap_or(JobStatus::Completed) {
                JobStatus::Failed => state.fail("job failed on the backend"),
                status => state.set_status(status),
            }
            Vec::new()
        }
        Msg::StreamAttached { attempt } => {
            if accepts(&state, attempt) && state.status() == JobStatus::Starting {
                state.set_status(JobStatus::Running);
            }
            Vec::new()
        }
        Msg::StreamEvent { attempt, event } => {
            if accepts(&state, attempt) {
                state.record_event(event);
            }
            Vec::new()
        }
        Msg::StreamClosed { attempt } => {
            if accepts(&state, attempt) {
                state.close_attempt();
                state.set_status(JobStatus::Completed);
            }
            Vec::new()
        }
        Msg::StreamFailed { attempt, error } => {
            if accepts(&state, attempt) {
                state.fail(error);
            }
            Vec::new()
        }
        Msg::RemarkSubmitted(text) => {
            let text = text.trim();
            let job_id = state.job_id().map(ToOwned::to_owned);
            match job_id {
                Some(job_id) if !text.is_empty() && state.status() == JobStatus::Running => {
                    // Echo locally; delivery is fire-and-forget.
                    state.record_event(Event::user_remark(text));
                    vec![Effect::SendRemark {
                        job_id,
                        text: text.to_string(),
                    }]
                }
                _ => {
                    research_debug!("remark dropped while {:?}", state.status());
                    Vec::new()
                }
            }
        }
        Msg::ResetRequested => {
            state.reset();
            vec![Effect::CancelStream, Effect::ClearPersistedJob]
        }
        Msg::HistoryRequested => vec![Effect::ListJobs],
        Msg::JobsListed(records) => {
            state.set_history(records);
            Vec::new()
        }
        Msg::JobsListFailed(error) => {
            research_warn!("listing jobs failed: {}", error);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn restore(state: &mut AppState, job_id: JobId) -> Vec<Effect> {
    let job_id = job_id.trim().to_string();
    if job_id.is_empty() {
        return Vec::new();
    }
    let mut effects = Vec::with_capacity(3);
    if state.close_attempt() {
        effects.push(Effect::CancelStream);
    }
    if state.job_id() == Some(job_id.as_str()) {
        state.reopen_job();
    } else {
        state.begin_job(Some(job_id.clone()), "");
    }
    effects.push(Effect::PersistActiveJob {
        job_id: job_id.clone(),
    });
    effects.push(Effect::LoadJob { job_id });
    effects
}

fn accepts(state: &AppState, attempt: StreamAttempt) -> bool {
    let open = state.is_open_attempt(attempt);
    if !open {
        research_debug!("dropping message from stale attempt {}", attempt);
    }
    open
}
