// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod deploy;
pub mod local;
pub mod master;
pub mod worker;

use skitter_core::{OperationRegistry, Workflow};
use skitter_runtime::{ImmediateStrategy, Runtime, StrategyRegistry};
use std::path::Path;
use std::sync::Arc;

use crate::exit_error::ExitError;

/// The registries the stock binary ships: the built-in strategies and no
/// operations. Applications embed `skitter-runtime` and register their
/// own operation set.
pub(crate) fn registries() -> (OperationRegistry, StrategyRegistry) {
    let operations = OperationRegistry::new();
    let strategies = StrategyRegistry::new();
    strategies.register(Arc::new(ImmediateStrategy::local()));
    strategies.register(Arc::new(ImmediateStrategy::spread()));
    (operations, strategies)
}

/// Read a workflow description file (the JSON form of the workflow data
/// model).
pub(crate) fn load_workflow(path: &Path) -> Result<Workflow, ExitError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ExitError::startup(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| ExitError::startup(format!("invalid workflow in {}: {e}", path.display())))
}

/// Deploy the configured workflow, if any, then wait the runtime out.
pub(crate) async fn deploy_and_wait(
    runtime: Runtime,
    deploy: Option<&Path>,
) -> Result<i32, ExitError> {
    if let Some(path) = deploy {
        let workflow = load_workflow(path)?;
        skitter_runtime::deploy(&runtime, &workflow)
            .await
            .map_err(|e| ExitError::startup(format!("deployment failed: {e}")))?;
    }
    Ok(runtime.wait().await)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
