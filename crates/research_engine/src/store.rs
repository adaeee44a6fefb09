//! Small keyed store for client-side state that must survive restarts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use research_logging::{research_debug, research_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

/// Key under which the id of the job to resume is kept.
pub const ACTIVE_JOB_KEY: &str = "active_job_id";

const STORE_FILENAME: &str = "store.ron";

/// Milliseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("store file is corrupt: {0}")]
    Corrupt(String),
    #[error("failed to encode store: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    #[serde(default)]
    pub expires_at_ms: Option<u64>,
}

impl StoredEntry {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|deadline| now_ms >= deadline)
    }
}

pub trait KeyValueStore: Send {
    /// Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn put(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

fn entry(value: &str, ttl: Option<Duration>, now_ms: u64) -> StoredEntry {
    StoredEntry {
        value: value.to_string(),
        expires_at_ms: ttl.map(|ttl| now_ms.saturating_add(ttl.as_millis() as u64)),
    }
}

pub struct MemoryStore {
    entries: BTreeMap<String, StoredEntry>,
    clock: Clock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: BTreeMap::new(),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = (self.clock)();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    fn put(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = (self.clock)();
        self.entries.insert(key.to_string(), entry(value, ttl, now));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by one RON file in the state directory. Every write
/// rewrites the whole file atomically; expired entries are pruned then.
pub struct FileStore {
    writer: AtomicFileWriter,
    clock: Clock,
}

impl FileStore {
    pub fn open(dir: PathBuf) -> Self {
        Self::with_clock(dir, system_clock())
    }

    pub fn with_clock(dir: PathBuf, clock: Clock) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            clock,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(STORE_FILENAME)
    }

    fn load(&self) -> Result<BTreeMap<String, StoredEntry>, StoreError> {
        match self.writer.read(STORE_FILENAME)? {
            None => Ok(BTreeMap::new()),
            Some(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Some(content) => {
                ron::from_str(&content).map_err(|err| StoreError::Corrupt(err.to_string()))
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, StoredEntry>) -> Result<(), StoreError> {
        let content = ron::ser::to_string_pretty(entries, ron::ser::PrettyConfig::new())
            .map_err(|err| StoreError::Encode(err.to_string()))?;
        self.writer.write(STORE_FILENAME, &content)?;
        Ok(())
    }

    /// Starts from an empty map when the file cannot be parsed.
    fn load_for_write(&self) -> Result<BTreeMap<String, StoredEntry>, StoreError> {
        match self.load() {
            Err(StoreError::Corrupt(err)) => {
                research_warn!("discarding unreadable store {:?}: {}", self.path(), err);
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = (self.clock)();
        Ok(self
            .load()?
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value))
    }

    fn put(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = (self.clock)();
        let mut entries = self.load_for_write()?;
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(key.to_string(), entry(value, ttl, now));
        research_debug!("storing {} in {:?}", key, self.path());
        self.save(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.load_for_write()?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            research_debug!("store {:?} is empty, removing it", self.path());
            self.writer.remove(STORE_FILENAME)?;
            return Ok(());
        }
        self.save(&entries)
    }
}
