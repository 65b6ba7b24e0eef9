//! Builders that hold an orchestrator's registration phase.

pub mod orchestrator_builder;

pub use orchestrator_builder::OrchestratorBuilder;
