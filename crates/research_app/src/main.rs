mod platform;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use platform::config::AppConfig;
use platform::{run_app, Session};

/// Streams a research job from the backend and renders it as it happens.
#[derive(Parser, Debug)]
#[command(name = "research", version)]
struct Cli {
    /// RON config file; defaults to ./research.ron when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Backend API base URL, overriding the config file.
    #[arg(long)]
    base_url: Option<String>,
    /// Print timeline entries and debug logs.
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new job; stdin lines are sent as remarks while it runs.
    Start {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Reattach to a running job or replay a finished one.
    Resume { job_id: Option<String> },
    /// Forget the persisted job.
    Reset,
    /// List past jobs.
    History,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    config.verbose |= cli.verbose;

    let session = match cli.command {
        Command::Start { query } => Session::Start(query.join(" ")),
        Command::Resume { job_id } => Session::Resume(job_id),
        Command::Reset => Session::Reset,
        Command::History => Session::History,
    };
    run_app(config, session)
}
