//! Configuration models for orchestrators.

pub mod orchestrator;

pub use orchestrator::OrchestratorConfig;
