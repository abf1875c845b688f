//! Builders to construct executors from configuration.

use std::collections::HashMap;

use crate::config::ExecutorSetConfig;
use crate::core::{Executor, ExecutorError};

/// Build one executor per entry of `cfg`, keyed and named by the map key.
///
/// # Errors
///
/// Returns `ExecutorError::InvalidConfig` if any entry is invalid; no
/// executor is built in that case.
pub fn build_executors(cfg: &ExecutorSetConfig) -> Result<HashMap<String, Executor>, ExecutorError> {
    cfg.validate()
        .map_err(|e| ExecutorError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut executors = HashMap::with_capacity(cfg.executors.len());
    for (name, executor_cfg) in &cfg.executors {
        let executor = Executor::with_config(executor_cfg.clone().with_name(name.as_str()))?;
        executors.insert(name.clone(), executor);
    }

    Ok(executors)
}
