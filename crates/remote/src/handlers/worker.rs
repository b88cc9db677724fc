// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side handler for the master connection.

use skitter_core::{Mode, NodeName, Tag};
use tracing::{info, warn};

use super::{ClusterExit, ExitSender};
use crate::handler::{AcceptError, ConnectionHandler};
use crate::registry::Registry;

/// Accepts exactly one master. A second distinct master is refused with
/// `has_master`; losing the accepted master terminates the runtime unless
/// `shutdown_with_master` was disabled.
pub struct MasterHandler {
    registry: Registry,
    exit: ExitSender,
    shutdown_with_master: bool,
    master: Option<NodeName>,
}

impl MasterHandler {
    pub fn new(registry: Registry, exit: ExitSender, shutdown_with_master: bool) -> Self {
        Self { registry, exit, shutdown_with_master, master: None }
    }
}

#[async_trait::async_trait]
impl ConnectionHandler for MasterHandler {
    async fn accept(
        &mut self,
        remote: NodeName,
        _mode: Mode,
        _tags: Vec<Tag>,
    ) -> Result<(), AcceptError> {
        match &self.master {
            Some(current) if *current == remote => Err(AcceptError::AlreadyConnected),
            Some(_) => Err(AcceptError::HasMaster),
            None => {
                info!(master = %remote, "master connected");
                self.master = Some(remote.clone());
                self.registry.add(remote, Mode::Master);
                Ok(())
            }
        }
    }

    async fn remove(&mut self, remote: NodeName) {
        if self.master.as_ref() == Some(&remote) {
            self.master = None;
            self.registry.remove(&remote);
        }
    }

    async fn down(&mut self, remote: NodeName) {
        if self.master.as_ref() != Some(&remote) {
            return;
        }
        self.master = None;
        self.registry.remove(&remote);
        warn!(master = %remote, "master lost");
        if self.shutdown_with_master {
            let _ = self.exit.send(ClusterExit::MasterLost(remote));
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
