use std::time::Duration;

use research_core::{Effect, Msg};
use research_engine::{EngineEvent, EngineHandle, KeyValueStore, ACTIVE_JOB_KEY};
use research_logging::{research_error, research_info, research_warn, set_active_job};

/// Executes effects against the engine and the local store, and turns
/// engine reports back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    store: Box<dyn KeyValueStore>,
    active_job_ttl: Option<Duration>,
}

impl EffectRunner {
    pub fn new(
        engine: EngineHandle,
        store: Box<dyn KeyValueStore>,
        active_job_ttl: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            store,
            active_job_ttl,
        }
    }

    pub fn persisted_job_id(&self) -> Option<String> {
        match self.store.get(ACTIVE_JOB_KEY) {
            Ok(job_id) => job_id,
            Err(err) => {
                research_warn!("could not read persisted job id: {}", err);
                None
            }
        }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CreateJob { query, attempt } => {
                    research_info!("CreateJob attempt={} query_len={}", attempt, query.len());
                    self.engine.create_job(query, attempt);
                }
                Effect::LoadJob { job_id } => {
                    set_active_job(Some(&job_id));
                    self.engine.load_job(job_id);
                }
                Effect::OpenStream { job_id, attempt } => {
                    set_active_job(Some(&job_id));
                    research_info!("OpenStream attempt={}", attempt);
                    self.engine.open_stream(job_id, attempt);
                }
                Effect::FetchHistory { job_id, attempt } => {
                    set_active_job(Some(&job_id));
                    research_info!("FetchHistory attempt={}", attempt);
                    self.engine.fetch_history(job_id, attempt);
                }
                Effect::CancelStream => {
                    self.engine.cancel_stream();
                }
                Effect::SendRemark { job_id, text } => {
                    self.engine.send_remark(job_id, text);
                }
                Effect::PersistActiveJob { job_id } => {
                    if let Err(err) = self.store.put(ACTIVE_JOB_KEY, &job_id, self.active_job_ttl)
                    {
                        research_error!("failed to persist job id {}: {}", job_id, err);
                    }
                }
                Effect::ClearPersistedJob => {
                    set_active_job(None);
                    if let Err(err) = self.store.remove(ACTIVE_JOB_KEY) {
                        research_error!("failed to clear persisted job id: {}", err);
                    }
                }
                Effect::ListJobs => {
                    self.engine.list_jobs();
                }
            }
        }
    }

    /// Waits up to `timeout` for the next engine report that maps to a message.
    pub fn next_msg(&self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        to_msg(event)
    }
}

pub(crate) fn to_msg(event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::JobCreated {
            attempt,
            job_id,
            created_at,
        } => Msg::JobCreated {
            attempt,
            job_id,
            created_at,
        },
        EngineEvent::JobCreationFailed { attempt, error } => Msg::JobCreationFailed {
            attempt,
            error: error.to_string(),
        },
        EngineEvent::JobLoaded(record) => Msg::JobLoaded(record),
        EngineEvent::JobLoadFailed { job_id, error } => Msg::JobLoadFailed {
            job_id,
            error: error.to_string(),
        },
        EngineEvent::HistoryLoaded { attempt, events } => Msg::HistoryLoaded { attempt, events },
        EngineEvent::StreamAttached { attempt } => Msg::StreamAttached { attempt },
        EngineEvent::StreamEvent { attempt, event } => Msg::StreamEvent { attempt, event },
        EngineEvent::StreamClosed { attempt } => Msg::StreamClosed { attempt },
        EngineEvent::StreamFailed { attempt, error } => Msg::StreamFailed {
            attempt,
            error: error.to_string(),
        },
        EngineEvent::RemarkFailed { job_id, error } => {
            research_warn!("remark for {} was not delivered: {}", job_id, error);
            return None;
        }
        EngineEvent::JobsListed(jobs) => Msg::JobsListed(jobs),
        EngineEvent::JobsListFailed { error } => Msg::JobsListFailed(error.to_string()),
    };
    Some(msg)
}
