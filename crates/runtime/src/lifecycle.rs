// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime startup per mode.
//!
//! Masters bind a worker handler, start the deployment distributor and
//! connect every configured worker in parallel, gating startup on all of
//! them. Workers bind a master handler and try their configured master,
//! staying alive when it is unreachable. Local runtimes skip the
//! transport entirely.

use futures_util::future::join_all;
use skitter_core::{Mode, NodeName, OperationRegistry};
use skitter_remote::{
    connect, Beacon, ConnectError, Dispatcher, DispatcherService, MasterHandler, Node, NodeConfig,
    Notifier, Registry, RejectHandler, TagStore, TransportError, WorkerHandler,
};
use skitter_remote::handler::spawn_handler;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::deploy::{spawn_distributor, DeployError};
use crate::runtime::Runtime;
use crate::strategy::StrategyRegistry;

/// Errors from starting a runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("could not connect to {} worker(s): {}", .0.len(), format_failures(.0))]
    WorkersFailed(Vec<(NodeName, ConnectError)>),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}

fn format_failures(failures: &[(NodeName, ConnectError)]) -> String {
    failures
        .iter()
        .map(|(node, reason)| format!("{node}: {reason}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Start a runtime with the given configuration and registries.
pub async fn start(
    config: RuntimeConfig,
    operations: OperationRegistry,
    strategies: StrategyRegistry,
) -> Result<Runtime, RuntimeError> {
    let registry = Registry::new();
    let tags = TagStore::new();
    let notifier = Notifier::new();
    let dispatcher = Dispatcher::new();
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();

    let node = match config.mode {
        Mode::Local => None,
        Mode::Master | Mode::Worker => Some(
            Node::spawn(NodeConfig {
                name: config.name.clone(),
                mode: config.mode,
                version: config.version.clone(),
                cookie: config.cookie.clone(),
                tags: config.tags.clone(),
                bind: config.bind,
            })
            .await?,
        ),
    };
    let name = match &node {
        Some(node) => node.name().clone(),
        None => NodeName::new(&config.name, "local"),
    };

    let runtime = Runtime::assemble(
        config.mode,
        name,
        node,
        registry.clone(),
        tags.clone(),
        dispatcher.clone(),
        notifier.clone(),
        operations,
        strategies,
        exit_tx,
        exit_rx,
    );

    if let Some(node) = runtime.node().cloned() {
        Beacon::install(&node);
        DispatcherService::install(&node, dispatcher.clone());
        crate::services::TasksService::install(&runtime);
        crate::services::WorkersService::install(&runtime);

        match config.mode {
            Mode::Master => {
                let handler = spawn_handler(
                    node.clone(),
                    WorkerHandler::new(
                        registry,
                        tags.clone(),
                        notifier,
                        runtime.exit_sender(),
                        config.shutdown_with_workers,
                    ),
                );
                dispatcher.bind(Mode::Worker, handler);
                dispatcher.default_bind(spawn_handler(node.clone(), RejectHandler));

                spawn_distributor(&runtime);
                connect_workers(&node, &dispatcher, &tags, &config).await?;
            }
            Mode::Worker => {
                let handler = spawn_handler(
                    node.clone(),
                    MasterHandler::new(
                        registry,
                        runtime.exit_sender(),
                        config.shutdown_with_master,
                    ),
                );
                dispatcher.bind(Mode::Master, handler);
                dispatcher.default_bind(spawn_handler(node.clone(), RejectHandler));

                if let Some(master) = &config.master {
                    match connect(&node, &dispatcher, master, Some(Mode::Master)).await {
                        Ok(_) => info!(master = %master, "connected to master"),
                        // A worker without its master stays alive and
                        // waits to be connected to instead.
                        Err(e) => warn!(master = %master, "could not connect to master: {e}"),
                    }
                }
            }
            Mode::Local => {}
        }
    }

    info!(mode = %config.mode, name = %runtime.name(), "runtime started");
    Ok(runtime)
}

/// Connect every configured worker in parallel; any failure aborts
/// master startup. Tags written in a worker spec are assigned on top of
/// whatever the worker announced itself.
async fn connect_workers(
    node: &Node,
    dispatcher: &Dispatcher,
    tags: &TagStore,
    config: &RuntimeConfig,
) -> Result<(), RuntimeError> {
    if config.workers.is_empty() {
        return Ok(());
    }
    let attempts = join_all(config.workers.iter().map(|spec| async move {
        let result = connect(node, dispatcher, &spec.node, Some(Mode::Worker)).await;
        (spec, result)
    }))
    .await;

    let mut failures: Vec<(NodeName, ConnectError)> = Vec::new();
    for (spec, result) in attempts {
        match result {
            Ok(_) if !spec.tags.is_empty() => {
                tags.extend(spec.node.clone(), spec.tags.clone());
            }
            Ok(_) => {}
            Err(e) => failures.push((spec.node.clone(), e)),
        }
    }
    if failures.is_empty() {
        info!(workers = config.workers.len(), "all workers connected");
        Ok(())
    } else {
        Err(RuntimeError::WorkersFailed(failures))
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
