//! Core orchestrator abstractions: messages, work units, the scheduling loop.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod work_unit;

pub use error::{OrchestratorError, PostError};
pub use message::{Message, OrchestratorId, Origin, PAYLOAD_SIZE};
pub use orchestrator::{
    MessageHandlerFn, Orchestrator, OrchestratorHandle, OrchestratorStats, RunState,
};
pub use work_unit::WorkUnitFn;
