// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime root: every long-lived service of one Skitter process.
//!
//! A [`Runtime`] is a cheap clone handle; strategies receive it in every
//! hook and reach the registries, the component store, the worker table
//! and the transport through it.

use parking_lot::Mutex;
use skitter_core::{Invocation, Mode, NodeName, OperationRegistry, Value};
use skitter_remote::{ClusterExit, Dispatcher, Node, Notifier, Registry, TagStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::services::{WorkerCast, WORKERS_SERVICE};
use crate::store::ComponentStore;
use crate::strategy::{DeploymentRef, StrategyRegistry};
use crate::worker::{MailboxMsg, WorkerId, WorkerRef, WorkerTable};

/// Process exit codes of a runtime.
pub const EXIT_OK: i32 = 0;
pub const EXIT_STARTUP_FAILED: i32 = 1;
pub const EXIT_WORKERS_LOST: i32 = 3;
pub const EXIT_MASTER_LOST: i32 = 4;

/// Errors from the worker send paths.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("local runtime is not distributed")]
    NotDistributed,

    #[error("no worker {0} on this runtime")]
    UnknownWorker(WorkerId),

    #[error("deployment {0} is not installed")]
    UnknownDeployment(DeploymentRef),

    #[error("deployment has no in-port named {0}")]
    UnknownPort(String),

    #[error("send failed: {0}")]
    Transport(String),
}

pub(crate) struct Inner {
    mode: Mode,
    name: NodeName,
    node: Option<Node>,
    registry: Registry,
    tags: TagStore,
    dispatcher: Dispatcher,
    notifier: Notifier,
    operations: OperationRegistry,
    strategies: StrategyRegistry,
    store: ComponentStore,
    workers: WorkerTable,
    exit_tx: mpsc::UnboundedSender<ClusterExit>,
    exit_rx: Mutex<Option<mpsc::UnboundedReceiver<ClusterExit>>>,
    cancel: CancellationToken,
}

/// Handle to a running Skitter runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("mode", &self.inner.mode)
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        mode: Mode,
        name: NodeName,
        node: Option<Node>,
        registry: Registry,
        tags: TagStore,
        dispatcher: Dispatcher,
        notifier: Notifier,
        operations: OperationRegistry,
        strategies: StrategyRegistry,
        exit_tx: mpsc::UnboundedSender<ClusterExit>,
        exit_rx: mpsc::UnboundedReceiver<ClusterExit>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode,
                name,
                node,
                registry,
                tags,
                dispatcher,
                notifier,
                operations,
                strategies,
                store: ComponentStore::new(),
                workers: WorkerTable::new(),
                exit_tx,
                exit_rx: Mutex::new(Some(exit_rx)),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn name(&self) -> &NodeName {
        &self.inner.name
    }

    /// The transport node; absent on non-distributed (local) runtimes.
    pub fn node(&self) -> Option<&Node> {
        self.inner.node.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn tags(&self) -> &TagStore {
        &self.inner.tags
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.inner.operations
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.inner.strategies
    }

    pub fn store(&self) -> &ComponentStore {
        &self.inner.store
    }

    pub fn workers(&self) -> &WorkerTable {
        &self.inner.workers
    }

    pub(crate) fn exit_sender(&self) -> mpsc::UnboundedSender<ClusterExit> {
        self.inner.exit_tx.clone()
    }

    /// Send a value to a worker's in-port, local or remote.
    pub fn send(
        &self,
        worker: &WorkerRef,
        value: Value,
        port: usize,
        invocation: Invocation,
    ) -> Result<(), SendError> {
        if worker.node == self.inner.name {
            let msg = MailboxMsg::Send { value, port, invocation };
            if self.inner.workers.send(worker.id, msg) {
                Ok(())
            } else {
                Err(SendError::UnknownWorker(worker.id))
            }
        } else {
            let node = self.node().ok_or(SendError::NotDistributed)?;
            let cast = WorkerCast::Send { worker: worker.id, value, port, invocation };
            node.cast(&worker.node, WORKERS_SERVICE, &cast)
                .map_err(|e| SendError::Transport(e.to_string()))
        }
    }

    /// Deliver a message that entered from outside Skitter; the worker
    /// processes it under [`Invocation::External`].
    pub fn send_external(&self, worker: &WorkerRef, value: Value) -> Result<(), SendError> {
        if worker.node == self.inner.name {
            if self.inner.workers.send(worker.id, MailboxMsg::External(value)) {
                Ok(())
            } else {
                Err(SendError::UnknownWorker(worker.id))
            }
        } else {
            let node = self.node().ok_or(SendError::NotDistributed)?;
            let cast = WorkerCast::External { worker: worker.id, value };
            node.cast(&worker.node, WORKERS_SERVICE, &cast)
                .map_err(|e| SendError::Transport(e.to_string()))
        }
    }

    /// Run the connect protocol against a remote runtime. Local-mode
    /// runtimes have no transport and report `not_distributed`.
    pub async fn connect(
        &self,
        remote: &NodeName,
        expected_mode: Option<Mode>,
    ) -> Result<Mode, skitter_remote::ConnectError> {
        let node = self.node().ok_or(skitter_remote::ConnectError::NotDistributed)?;
        skitter_remote::connect(node, self.dispatcher(), remote, expected_mode).await
    }

    /// Route a remote runtime's death into a locally hosted worker's
    /// mailbox; the strategy's process hook sees it as a remote-down
    /// message. Fires immediately when the remote is not connected.
    pub fn watch_remote(&self, worker: &WorkerRef, remote: &NodeName) -> Result<(), SendError> {
        if worker.node != self.inner.name {
            return Err(SendError::Transport(
                "remote watches are installed on the hosting runtime".to_string(),
            ));
        }
        let tx = self
            .inner
            .workers
            .sender(worker.id)
            .ok_or(SendError::UnknownWorker(worker.id))?;
        let node = self.node().ok_or(SendError::NotDistributed)?;
        node.monitor(remote, move |name| {
            let _ = tx.send(MailboxMsg::RemoteDown(name));
        });
        Ok(())
    }

    /// Feed external values into an installed deployment's in-port. Each
    /// value travels under [`Invocation::External`].
    pub async fn inject(
        &self,
        reference: DeploymentRef,
        port: &str,
        values: Vec<Value>,
    ) -> Result<(), SendError> {
        let inputs = self
            .store()
            .inputs(reference)
            .ok_or(SendError::UnknownDeployment(reference))?;
        let dests = inputs
            .iter()
            .find(|(name, _)| name == port)
            .map(|(_, dests)| dests.clone())
            .ok_or_else(|| SendError::UnknownPort(port.to_string()))?;
        for value in values {
            for dest in &dests {
                let Some(ctx) = self.store().context(reference, dest.component) else {
                    continue;
                };
                let ctx = ctx.with_invocation(Invocation::External);
                let strategy = Arc::clone(&ctx.strategy);
                strategy.deliver(self, ctx, value.clone(), dest.port).await;
            }
        }
        Ok(())
    }

    /// Block until a shutdown policy fires or [`Runtime::shutdown`] is
    /// called, and return the process exit code.
    pub async fn wait(&self) -> i32 {
        let rx = self.inner.exit_rx.lock().take();
        let Some(mut rx) = rx else {
            self.inner.cancel.cancelled().await;
            return EXIT_OK;
        };
        tokio::select! {
            _ = self.inner.cancel.cancelled() => EXIT_OK,
            exit = rx.recv() => match exit {
                Some(ClusterExit::MasterLost(_)) => EXIT_MASTER_LOST,
                Some(ClusterExit::WorkerLost(_)) => EXIT_WORKERS_LOST,
                None => EXIT_OK,
            },
        }
    }

    /// Tear the runtime down: close the transport and release `wait`.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(node) = &self.inner.node {
            node.shutdown();
        }
    }
}
