use std::io::{self, BufRead, Write};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use log::LevelFilter;
use research_core::{update, AppState, JobStatus, Msg};
use research_engine::{ensure_state_dir, EngineHandle, FileStore, ReqwestApi};
use research_logging::research_info;

use super::config::AppConfig;
use super::effects::EffectRunner;
use super::logging;
use super::render::TerminalRenderer;

/// Rendering is coalesced to at most one pass per tick.
const TICK: Duration = Duration::from_millis(75);

/// What the user asked the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Start(String),
    /// Resume the given job, or the persisted one when `None`.
    Resume(Option<String>),
    Reset,
    History,
}

pub fn run_app(config: AppConfig, session: Session) -> anyhow::Result<()> {
    let level = if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(config.log, level);
    research_info!("research client starting against {}", config.base_url);

    ensure_state_dir(&config.state_dir)
        .with_context(|| format!("preparing {}", config.state_dir.display()))?;
    let api = ReqwestApi::new(&config.api_settings())?;
    let engine = EngineHandle::new(Arc::new(api), config.stream_settings())
        .context("starting engine worker")?;
    let store = FileStore::open(config.state_dir.clone());
    let runner = EffectRunner::new(engine, Box::new(store), config.active_job_ttl());

    let first = match &session {
        Session::Start(query) if query.trim().is_empty() => bail!("the query is empty"),
        Session::Start(query) => Msg::StartRequested(query.clone()),
        Session::Resume(Some(job_id)) => Msg::RestoreRequested(job_id.clone()),
        Session::Resume(None) => match runner.persisted_job_id() {
            Some(job_id) => Msg::AppStarted {
                persisted_job_id: Some(job_id),
            },
            None => bail!("no persisted job to resume; pass a job id"),
        },
        Session::Reset => Msg::ResetRequested,
        Session::History => Msg::HistoryRequested,
    };

    let mut app = App {
        state: AppState::new(),
        runner,
        renderer: TerminalRenderer::new(config.verbose),
    };
    app.dispatch(first);

    match session {
        Session::Reset => {
            println!("Session cleared.");
            Ok(())
        }
        Session::History => app.wait_for_history(),
        Session::Start(_) | Session::Resume(_) => app.follow_job(),
    }
}

struct App {
    state: AppState,
    runner: EffectRunner,
    renderer: TerminalRenderer,
}

impl App {
    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn render_if_dirty(&mut self) {
        if !self.state.consume_dirty() {
            return;
        }
        let view = self.state.view();
        let lines = self.renderer.render(&view);
        if lines.is_empty() {
            return;
        }
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        let _ = out.flush();
    }

    fn follow_job(&mut self) -> anyhow::Result<()> {
        let remarks = spawn_remark_reader();
        let mut next_tick = Instant::now() + TICK;
        loop {
            while let Ok(text) = remarks.try_recv() {
                self.dispatch(Msg::RemarkSubmitted(text));
            }

            let wait = next_tick.saturating_duration_since(Instant::now());
            if let Some(msg) = self.runner.next_msg(wait) {
                self.dispatch(msg);
            }

            if Instant::now() >= next_tick {
                next_tick = Instant::now() + TICK;
                self.dispatch(Msg::Tick);
                self.render_if_dirty();
            }

            let status = self.state.status();
            if status.is_terminal() || status == JobStatus::Idle {
                self.render_if_dirty();
                break;
            }
        }

        match self.state.status() {
            JobStatus::Failed => bail!(
                "job failed: {}",
                self.state.view().failure.unwrap_or_default()
            ),
            _ => Ok(()),
        }
    }

    fn wait_for_history(&mut self) -> anyhow::Result<()> {
        loop {
            let Some(msg) = self.runner.next_msg(Duration::from_secs(60)) else {
                bail!("timed out waiting for the job list");
            };
            let done = match &msg {
                Msg::JobsListed(jobs) => {
                    if jobs.is_empty() {
                        println!("No past jobs.");
                    }
                    true
                }
                Msg::JobsListFailed(error) => bail!("listing jobs failed: {error}"),
                _ => false,
            };
            self.dispatch(msg);
            if done {
                self.render_if_dirty();
                return Ok(());
            }
        }
    }
}

/// Each non-empty stdin line becomes a remark for the running job.
fn spawn_remark_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
