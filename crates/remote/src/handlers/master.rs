// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master-side handler for worker connections.

use skitter_core::{Mode, NodeName, Tag};
use std::collections::HashSet;
use tracing::{info, warn};

use super::{ClusterExit, ExitSender};
use crate::handler::{AcceptError, ConnectionHandler};
use crate::notifier::Notifier;
use crate::registry::Registry;
use crate::tags::TagStore;

/// Accepts each distinct worker once, maintains the registry and tag
/// tables, and fans worker_up / worker_down out through the notifier.
pub struct WorkerHandler {
    registry: Registry,
    tags: TagStore,
    notifier: Notifier,
    exit: ExitSender,
    shutdown_with_workers: bool,
    connected: HashSet<NodeName>,
}

impl WorkerHandler {
    pub fn new(
        registry: Registry,
        tags: TagStore,
        notifier: Notifier,
        exit: ExitSender,
        shutdown_with_workers: bool,
    ) -> Self {
        Self {
            registry,
            tags,
            notifier,
            exit,
            shutdown_with_workers,
            connected: HashSet::new(),
        }
    }

    fn forget(&mut self, remote: &NodeName) -> bool {
        if !self.connected.remove(remote) {
            return false;
        }
        self.registry.remove(remote);
        self.tags.remove(remote);
        self.notifier.notify_down(remote.clone());
        true
    }
}

#[async_trait::async_trait]
impl ConnectionHandler for WorkerHandler {
    async fn accept(
        &mut self,
        remote: NodeName,
        _mode: Mode,
        tags: Vec<Tag>,
    ) -> Result<(), AcceptError> {
        if !self.connected.insert(remote.clone()) {
            return Err(AcceptError::AlreadyConnected);
        }
        info!(worker = %remote, "worker connected");
        self.registry.add(remote.clone(), Mode::Worker);
        self.tags.add(remote.clone(), tags.clone());
        self.notifier.notify_up(remote, tags);
        Ok(())
    }

    async fn remove(&mut self, remote: NodeName) {
        self.forget(&remote);
    }

    async fn down(&mut self, remote: NodeName) {
        if !self.forget(&remote) {
            return;
        }
        warn!(worker = %remote, "worker lost");
        if self.shutdown_with_workers {
            let _ = self.exit.send(ClusterExit::WorkerLost(remote));
        }
    }
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
