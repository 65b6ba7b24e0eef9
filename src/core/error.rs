//! Error types for orchestrator operations.

use thiserror::Error;

/// Errors produced while building or starting an orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The execution thread could not be spawned.
    #[error("failed to spawn orchestrator thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Reasons a message could not be posted.
///
/// None of these are faults: the posting work unit decides whether to retry,
/// drop, or escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PostError {
    /// The target inbox is at capacity.
    #[error("inbox full")]
    Full,
    /// The target has stopped and refuses further posts.
    #[error("orchestrator stopped")]
    Stopped,
    /// The target orchestrator no longer exists.
    #[error("orchestrator disconnected")]
    Disconnected,
    /// The message carries no origin to reply to.
    #[error("message has no origin")]
    NoOrigin,
}
