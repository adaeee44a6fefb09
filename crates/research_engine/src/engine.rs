use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use research_core::{Event, JobId, StreamAttempt};
use research_logging::{research_debug, research_info, research_warn};
use tokio_util::sync::CancellationToken;

use crate::api::ResearchApi;
use crate::transport::{pump, EventSink, StreamSettings};
use crate::{EngineEvent, StreamEnd, TransportError};

enum EngineCommand {
    CreateJob {
        query: String,
        attempt: StreamAttempt,
    },
    LoadJob {
        job_id: JobId,
    },
    ListJobs,
    FetchHistory {
        job_id: JobId,
        attempt: StreamAttempt,
    },
    OpenStream {
        job_id: JobId,
        attempt: StreamAttempt,
    },
    CancelStream,
    SendRemark {
        job_id: JobId,
        text: String,
    },
}

/// Owns the async worker. At most one stream or history fetch is live at a
/// time; starting another cancels the previous one.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(api: Arc<dyn ResearchApi>, settings: StreamSettings) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;

        thread::spawn(move || {
            let mut current = CancellationToken::new();
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::CancelStream => {
                        current.cancel();
                    }
                    EngineCommand::OpenStream { job_id, attempt } => {
                        current.cancel();
                        current = CancellationToken::new();
                        let task = StreamTask {
                            api: api.clone(),
                            settings: settings.clone(),
                            cancel: current.clone(),
                            event_tx: event_tx.clone(),
                        };
                        runtime.spawn(async move { task.run(job_id, attempt).await });
                    }
                    EngineCommand::FetchHistory { job_id, attempt } => {
                        current.cancel();
                        current = CancellationToken::new();
                        let cancel = current.clone();
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            fetch_history(api.as_ref(), job_id, attempt, &cancel, &event_tx).await;
                        });
                    }
                    command => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            handle_request(api.as_ref(), command, &event_tx).await;
                        });
                    }
                }
            }
            current.cancel();
        });

        Ok(Self { cmd_tx, event_rx })
    }

    /// The reply carries `attempt` back so a late one can be told apart.
    pub fn create_job(&self, query: impl Into<String>, attempt: StreamAttempt) {
        self.send(EngineCommand::CreateJob {
            query: query.into(),
            attempt,
        });
    }

    pub fn load_job(&self, job_id: JobId) {
        self.send(EngineCommand::LoadJob { job_id });
    }

    pub fn list_jobs(&self) {
        self.send(EngineCommand::ListJobs);
    }

    pub fn fetch_history(&self, job_id: JobId, attempt: StreamAttempt) {
        self.send(EngineCommand::FetchHistory { job_id, attempt });
    }

    pub fn open_stream(&self, job_id: JobId, attempt: StreamAttempt) {
        self.send(EngineCommand::OpenStream { job_id, attempt });
    }

    pub fn cancel_stream(&self) {
        self.send(EngineCommand::CancelStream);
    }

    pub fn send_remark(&self, job_id: JobId, text: impl Into<String>) {
        self.send(EngineCommand::SendRemark {
            job_id,
            text: text.into(),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            research_warn!("engine worker is gone; command dropped");
        }
    }
}

/// Tags every parsed event with the attempt it belongs to.
struct ChannelEventSink {
    attempt: StreamAttempt,
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: Event) {
        let _ = self.tx.send(EngineEvent::StreamEvent {
            attempt: self.attempt,
            event,
        });
    }
}

struct StreamTask {
    api: Arc<dyn ResearchApi>,
    settings: StreamSettings,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl StreamTask {
    async fn run(self, job_id: JobId, attempt: StreamAttempt) {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                research_debug!("attempt {} cancelled while connecting", attempt);
                return;
            }
            opened = self.api.open_stream(&job_id) => opened,
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                self.report(EngineEvent::StreamFailed {
                    attempt,
                    error: TransportError::Api(err),
                });
                return;
            }
        };
        if self.cancel.is_cancelled() {
            return;
        }
        research_info!("stream attached for {} (attempt {})", job_id, attempt);
        self.report(EngineEvent::StreamAttached { attempt });

        let sink = ChannelEventSink {
            attempt,
            tx: self.event_tx.clone(),
        };
        match pump(stream, &self.cancel, &self.settings, &sink).await {
            Ok(StreamEnd::Closed) => {
                research_info!("stream closed for {}", job_id);
                self.report(EngineEvent::StreamClosed { attempt });
            }
            Ok(StreamEnd::Cancelled) => {
                research_debug!("attempt {} cancelled", attempt);
            }
            Err(error) => {
                research_warn!("stream failed for {}: {}", job_id, error);
                self.report(EngineEvent::StreamFailed { attempt, error });
            }
        }
    }

    /// Nothing is reported once the attempt has been cancelled.
    fn report(&self, event: EngineEvent) {
        if !self.cancel.is_cancelled() {
            let _ = self.event_tx.send(event);
        }
    }
}

async fn fetch_history(
    api: &dyn ResearchApi,
    job_id: JobId,
    attempt: StreamAttempt,
    cancel: &CancellationToken,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        fetched = api.job_events(&job_id) => fetched,
    };
    if cancel.is_cancelled() {
        return;
    }
    let event = match fetched {
        Ok(events) => {
            research_info!("loaded {} stored events for {}", events.len(), job_id);
            EngineEvent::HistoryLoaded { attempt, events }
        }
        Err(error) => EngineEvent::StreamFailed {
            attempt,
            error: TransportError::Api(error),
        },
    };
    let _ = event_tx.send(event);
}

async fn handle_request(
    api: &dyn ResearchApi,
    command: EngineCommand,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    let event = match command {
        EngineCommand::CreateJob { query, attempt } => match api.create_job(&query).await {
            Ok(ticket) => EngineEvent::JobCreated {
                attempt,
                job_id: ticket.job_id,
                created_at: ticket.created_at,
            },
            Err(error) => EngineEvent::JobCreationFailed { attempt, error },
        },
        EngineCommand::LoadJob { job_id } => match api.job(&job_id).await {
            Ok(record) => EngineEvent::JobLoaded(record),
            Err(error) => EngineEvent::JobLoadFailed { job_id, error },
        },
        EngineCommand::ListJobs => match api.list_jobs().await {
            Ok(jobs) => EngineEvent::JobsListed(jobs),
            Err(error) => EngineEvent::JobsListFailed { error },
        },
        EngineCommand::SendRemark { job_id, text } => {
            match api.send_remark(&job_id, &text).await {
                Ok(()) => return,
                Err(error) => EngineEvent::RemarkFailed { job_id, error },
            }
        }
        EngineCommand::FetchHistory { .. }
        | EngineCommand::OpenStream { .. }
        | EngineCommand::CancelStream => return,
    };
    let _ = event_tx.send(event);
}
