//! Research engine: backend API, NDJSON transport and local state.
mod api;
mod engine;
mod persist;
mod store;
mod transport;
mod types;

pub use api::{decode_event_body, ApiSettings, ByteStream, ReqwestApi, ResearchApi};
pub use engine::EngineHandle;
pub use persist::{ensure_state_dir, AtomicFileWriter, PersistError};
pub use store::{
    system_clock, Clock, FileStore, KeyValueStore, MemoryStore, StoreError, StoredEntry,
    ACTIVE_JOB_KEY,
};
pub use transport::{parse_ndjson, pump, EventSink, NdjsonDecoder, StreamSettings};
pub use types::{ApiError, EngineEvent, JobTicket, StreamEnd, TransportError};
