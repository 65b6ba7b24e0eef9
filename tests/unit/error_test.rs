//! Tests for error types

use prometheus_workload::core::{OrchestratorError, PostError};

#[test]
fn test_post_error_display() {
    assert_eq!(PostError::Full.to_string(), "inbox full");
    assert_eq!(PostError::Stopped.to_string(), "orchestrator stopped");
    assert_eq!(PostError::Disconnected.to_string(), "orchestrator disconnected");
    assert_eq!(PostError::NoOrigin.to_string(), "message has no origin");
}

#[test]
fn test_invalid_config_error() {
    let err = OrchestratorError::InvalidConfig("name must not be empty".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: name must not be empty"
    );
}

#[test]
fn test_errors_convert_to_anyhow() {
    let err: anyhow::Error = PostError::Full.into();
    assert_eq!(err.downcast_ref::<PostError>(), Some(&PostError::Full));
}
