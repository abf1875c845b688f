//! Executor configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment variable holding the slot budget.
pub const ENV_SLOTS: &str = "EXECUTOR_SLOTS";
/// Environment variable holding the executor name.
pub const ENV_NAME: &str = "EXECUTOR_NAME";
/// Environment variable holding the task thread name prefix.
pub const ENV_THREAD_PREFIX: &str = "EXECUTOR_THREAD_PREFIX";
/// Environment variable holding the task thread stack size in bytes.
pub const ENV_STACK_SIZE: &str = "EXECUTOR_STACK_SIZE";

/// Configuration for a single executor.
///
/// # Example
///
/// ```
/// use prometheus_slot_executor::config::ExecutorConfig;
///
/// let config = ExecutorConfig::new()
///     .with_name("inference")
///     .with_slots(4)
///     .with_thread_stack_size(4 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Name used in log records and statistics.
    pub name: String,
    /// Work items allowed to run without queueing.
    pub slots: usize,
    /// Prefix for task thread names; each thread is named `<prefix>-<task id>`.
    pub thread_name_prefix: String,
    /// Stack size for task threads in bytes. `None` uses the platform default.
    pub thread_stack_size: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "executor".into(),
            slots: num_cpus::get(),
            thread_name_prefix: "slot-task".into(),
            thread_stack_size: None,
        }
    }
}

impl ExecutorConfig {
    /// Default configuration: one slot per logical CPU.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the executor name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the slot budget.
    #[must_use]
    pub const fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Set the task thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the task thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.slots == 0 {
            return Err("slots must be greater than 0".into());
        }
        if self.name.is_empty() {
            return Err("name must not be empty".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        // std::thread::Builder panics on names containing NUL.
        if self.thread_name_prefix.contains('\0') {
            return Err("thread_name_prefix must not contain NUL bytes".into());
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `EXECUTOR_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message if a variable cannot be parsed or validation fails.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the
    /// `EXECUTOR_*` variable names.
    ///
    /// # Errors
    ///
    /// Returns a message if a value cannot be parsed or validation fails.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(name) = lookup(ENV_NAME) {
            cfg.name = name;
        }
        if let Some(raw) = lookup(ENV_SLOTS) {
            cfg.slots = parse_usize(ENV_SLOTS, &raw)?;
        }
        if let Some(prefix) = lookup(ENV_THREAD_PREFIX) {
            cfg.thread_name_prefix = prefix;
        }
        if let Some(raw) = lookup(ENV_STACK_SIZE) {
            cfg.thread_stack_size = Some(parse_usize(ENV_STACK_SIZE, &raw)?);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}={raw:?} is not a non-negative integer: {e}"))
}

/// Configuration for a set of named executors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorSetConfig {
    /// Map of executor name to configuration. The map key overrides `name`.
    pub executors: HashMap<String, ExecutorConfig>,
}

impl ExecutorSetConfig {
    /// Validate all executors and ensure at least one exists.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid executor.
    pub fn validate(&self) -> Result<(), String> {
        if self.executors.is_empty() {
            return Err("at least one executor must be defined".into());
        }
        for (name, executor) in &self.executors {
            executor
                .validate()
                .map_err(|e| format!("executor `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse a set configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = ExecutorConfig::new();
        assert!(cfg.slots >= 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_slots_rejected() {
        let err = ExecutorConfig::new().with_slots(0).validate().unwrap_err();
        assert!(err.contains("slots"));
    }

    #[test]
    fn test_prefix_with_nul_rejected() {
        let cfg = ExecutorConfig::new().with_thread_name_prefix("bad\0prefix");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_SLOTS, " 3 "),
            (ENV_NAME, "ingest"),
            (ENV_STACK_SIZE, "65536"),
        ]);
        let cfg = ExecutorConfig::from_lookup(|k| vars.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(cfg.slots, 3);
        assert_eq!(cfg.name, "ingest");
        assert_eq!(cfg.thread_name_prefix, "slot-task");
        assert_eq!(cfg.thread_stack_size, Some(65536));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ExecutorConfig::from_lookup(|k| (k == ENV_SLOTS).then(|| "-1".to_string()))
            .unwrap_err();
        assert!(err.contains(ENV_SLOTS));
    }
}
