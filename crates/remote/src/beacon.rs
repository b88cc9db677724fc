// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Beacon: the per-node identity probe.
//!
//! Every Skitter runtime registers a beacon service answering "is this a
//! Skitter runtime, and in what mode?". The connect protocol probes it
//! before any membership step; a peer without a beacon is not a Skitter
//! node, whatever else it speaks.

use serde::{Deserialize, Serialize};
use skitter_core::{Mode, NodeName, Value};
use std::sync::Arc;

use crate::frame::RpcError;
use crate::node::{CallError, Node, Service};

/// Service name the beacon registers under.
pub const SERVICE: &str = "beacon";

/// Answer to a probe: the remote's version and mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReply {
    pub version: String,
    pub mode: Mode,
}

/// The local identity service. Mode and version are fixed at startup.
pub struct Beacon {
    mode: Mode,
    version: String,
}

impl Beacon {
    pub fn new(mode: Mode, version: impl Into<String>) -> Self {
        Self { mode, version: version.into() }
    }

    /// Register the beacon on the node's service table.
    pub fn install(node: &Node) -> Arc<Beacon> {
        let beacon = Arc::new(Beacon::new(node.mode(), node.version()));
        node.register_service(SERVICE, Arc::clone(&beacon) as Arc<dyn Service>);
        beacon
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

#[async_trait::async_trait]
impl Service for Beacon {
    async fn handle(&self, _from: NodeName, _body: Value) -> Result<Value, RpcError> {
        let reply = ProbeReply { version: self.version.clone(), mode: self.mode };
        serde_json::to_value(reply).map_err(RpcError::bad_request)
    }
}

/// Probe a remote runtime's beacon. Requires a transport connection.
pub async fn probe(node: &Node, remote: &NodeName) -> Result<ProbeReply, CallError> {
    node.request(remote, SERVICE, &Value::Null).await
}

#[cfg(test)]
#[path = "beacon_tests.rs"]
mod tests;
