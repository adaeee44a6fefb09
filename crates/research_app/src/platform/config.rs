use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use research_engine::{ApiSettings, StreamSettings};
use serde::{Deserialize, Serialize};

use super::logging::LogDestination;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "research.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Fail a live stream after this many seconds without an event.
    pub max_silence_secs: Option<u64>,
    pub state_dir: PathBuf,
    /// How long a persisted job id stays resumable; `None` keeps it forever.
    pub active_job_ttl_hours: Option<u64>,
    pub log: LogDestination,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        Self {
            base_url: api.base_url,
            connect_timeout_secs: api.connect_timeout.as_secs(),
            request_timeout_secs: api.request_timeout.as_secs(),
            max_silence_secs: None,
            state_dir: PathBuf::from(".research"),
            active_job_ttl_hours: Some(24 * 7),
            log: LogDestination::File,
            verbose: false,
        }
    }
}

impl AppConfig {
    /// An explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        ron::from_str(content).map_err(|err| anyhow!("{err}"))
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            max_silence: self
                .max_silence_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn active_job_ttl(&self) -> Option<Duration> {
        self.active_job_ttl_hours
            .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::AppConfig;
    use crate::platform::logging::LogDestination;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = AppConfig::parse(r#"(base_url: "http://research.local/api", max_silence_secs: Some(30))"#)
            .unwrap();
        assert_eq!(config.base_url, "http://research.local/api");
        assert_eq!(
            config.stream_settings().max_silence,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.state_dir, AppConfig::default().state_dir);
        assert_eq!(config.log, LogDestination::File);
    }

    #[test]
    fn zero_silence_disables_the_limit() {
        let config = AppConfig {
            max_silence_secs: Some(0),
            ..AppConfig::default()
        };
        assert_eq!(config.stream_settings().max_silence, None);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("absent.ron"))).is_err());

        let path = dir.path().join("research.ron");
        std::fs::write(&path, "(log: Both, active_job_ttl_hours: None)").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log, LogDestination::Both);
        assert_eq!(config.active_job_ttl(), None);
    }
}
