//! Tests for configuration parsing and executor construction from config.

use prometheus_slot_executor::builders::build_executors;
use prometheus_slot_executor::config::{ExecutorConfig, ExecutorSetConfig};
use prometheus_slot_executor::ExecutorError;

#[test]
fn test_executor_config_from_json() {
    let cfg = ExecutorConfig::from_json_str(
        r#"{"name": "embeddings", "slots": 4, "thread_stack_size": 1048576}"#,
    )
    .unwrap();
    assert_eq!(cfg.name, "embeddings");
    assert_eq!(cfg.slots, 4);
    assert_eq!(cfg.thread_stack_size, Some(1_048_576));
    assert_eq!(cfg.thread_name_prefix, "slot-task");
}

#[test]
fn test_executor_config_json_zero_slots() {
    let err = ExecutorConfig::from_json_str(r#"{"slots": 0}"#).unwrap_err();
    assert!(err.contains("slots must be greater than 0"), "{err}");
}

#[test]
fn test_executor_config_json_negative_slots() {
    let err = ExecutorConfig::from_json_str(r#"{"slots": -2}"#).unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_set_config_from_json_builds_executors() {
    let cfg = ExecutorSetConfig::from_json_str(
        r#"{
            "executors": {
                "cpu": {"slots": 8},
                "gpu": {"slots": 1, "thread_name_prefix": "gpu-task"}
            }
        }"#,
    )
    .unwrap();

    let executors = build_executors(&cfg).unwrap();
    assert_eq!(executors.len(), 2);
    assert_eq!(executors["cpu"].config().slots, 8);
    assert_eq!(executors["gpu"].config().thread_name_prefix, "gpu-task");
    assert_ne!(executors["cpu"].id(), executors["gpu"].id());

    let handle = executors["gpu"].submit(|| "on gpu executor");
    assert_eq!(handle.result(), Ok(&"on gpu executor"));
}

#[test]
fn test_set_config_names_bad_entry() {
    let err = ExecutorSetConfig::from_json_str(r#"{"executors": {"broken": {"slots": 0}}}"#)
        .unwrap_err();
    assert!(err.contains("executor `broken` invalid"), "{err}");
}

#[test]
fn test_build_executors_rejects_invalid_set() {
    let mut cfg = ExecutorSetConfig::default();
    cfg.executors
        .insert("empty-prefix".into(), ExecutorConfig::new().with_thread_name_prefix(""));

    let err = build_executors(&cfg).unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidConfig(msg) if msg.contains("thread_name_prefix")));
}
