//! Tests for configuration validation

use prometheus_workload::builders::OrchestratorBuilder;
use prometheus_workload::config::OrchestratorConfig;
use prometheus_workload::core::OrchestratorError;
use std::time::Duration;

#[test]
fn test_config_defaults() {
    let config = OrchestratorConfig::default();
    assert_eq!(config.name, "orchestrator");
    assert_eq!(config.inbox_capacity, 128);
    assert_eq!(config.idle_ceiling(), Duration::from_millis(100));
    assert_eq!(config.min_tick(), Duration::from_micros(1));
    assert!(!config.reject_posts_after_stop);
    assert!(config.thread_stack_size.is_none());
}

#[test]
fn test_config_invalid_capacity() {
    let invalid = OrchestratorConfig::new().with_inbox_capacity(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_name() {
    let invalid = OrchestratorConfig::new().with_name("  ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_ceiling() {
    let invalid = OrchestratorConfig {
        idle_ceiling_ns: 0,
        min_tick_ns: 0,
        ..OrchestratorConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_invalid_stack_size() {
    let invalid = OrchestratorConfig::new().with_thread_stack_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "name": "telemetry",
        "inbox_capacity": 32,
        "idle_ceiling_ns": 50000000,
        "min_tick_ns": 0,
        "reject_posts_after_stop": true,
        "thread_stack_size": 262144
    }"#;

    let config = OrchestratorConfig::from_json_str(json).unwrap();
    assert_eq!(config.name, "telemetry");
    assert_eq!(config.inbox_capacity, 32);
    assert_eq!(config.idle_ceiling(), Duration::from_millis(50));
    assert!(config.reject_posts_after_stop);
    assert_eq!(config.thread_stack_size, Some(262_144));
}

#[test]
fn test_config_from_json_rejects_invalid() {
    let err = OrchestratorConfig::from_json_str(r#"{ "inbox_capacity": 0 }"#).unwrap_err();
    assert!(err.contains("inbox_capacity"));

    let err = OrchestratorConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_config_json_roundtrip() {
    let config = OrchestratorConfig::new()
        .with_name("roundtrip")
        .with_idle_ceiling(Duration::from_millis(10));
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(OrchestratorConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let err = OrchestratorBuilder::new(OrchestratorConfig::new().with_inbox_capacity(0)).unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidConfig(_)));
    assert_eq!(
        err.to_string(),
        "invalid configuration: inbox_capacity must be greater than 0"
    );
}

#[test]
fn test_custom_stack_size_starts() -> anyhow::Result<()> {
    let orchestrator = OrchestratorBuilder::new(
        OrchestratorConfig::new()
            .with_name("small-stack")
            .with_thread_stack_size(256 * 1024),
    )?
    .start()?;
    orchestrator.stop();
    orchestrator.wait();
    Ok(())
}
