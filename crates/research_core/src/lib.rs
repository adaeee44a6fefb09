//! Research core: event model, pure reducers and the job lifecycle state machine.
pub mod artifact;
mod effect;
mod event;
mod log;
mod msg;
mod payload;
pub mod plan;
mod state;
pub mod timeline;
pub mod transcript;
mod update;
mod view_model;

pub use artifact::{ArtifactBody, ArtifactDispatcher, ArtifactRenderer, ArtifactView};
pub use effect::Effect;
pub use event::{Event, EventKind, ParseError, Timestamp, PLANNING_TASK_ID};
pub use log::EventLog;
pub use msg::Msg;
pub use plan::{reduce_plan_board, PlanBoard, Task, TaskStatus, TaskStreamItem, TaskUpdateKind};
pub use state::{AppState, Job, JobId, JobRecord, JobStatus, StreamAttempt};
pub use timeline::{reduce_timeline, TimelineEntry};
pub use transcript::{reduce_transcript, Message, Role, TranscriptReducer};
pub use update::update;
pub use view_model::AppViewModel;
