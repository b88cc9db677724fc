// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher: routes accept requests to the handler bound to a mode.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use skitter_core::{Mode, NodeName, Tag, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::frame::RpcError;
use crate::handler::{AcceptError, HandlerRef};
use crate::node::{Node, Service};

/// Service name remote runtimes address accept requests to.
pub const SERVICE: &str = "dispatcher";

#[derive(Default)]
struct Table {
    bound: HashMap<Mode, HandlerRef>,
    default: Option<HandlerRef>,
}

/// Mode → handler routing table. Updated only through bind calls.
#[derive(Default, Clone)]
pub struct Dispatcher {
    inner: Arc<RwLock<Table>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler for one remote mode.
    pub fn bind(&self, mode: Mode, handler: HandlerRef) {
        self.inner.write().bound.insert(mode, handler);
    }

    /// Bind the fallback handler for otherwise-unbound modes.
    pub fn default_bind(&self, handler: HandlerRef) {
        self.inner.write().default = Some(handler);
    }

    fn handler_for(&self, mode: Mode) -> Option<HandlerRef> {
        let table = self.inner.read();
        table.bound.get(&mode).or(table.default.as_ref()).cloned()
    }

    /// Route an accept request for `remote` (of mode `mode`) to the bound
    /// handler and await its verdict.
    pub async fn dispatch(
        &self,
        remote: NodeName,
        mode: Mode,
        tags: Vec<Tag>,
    ) -> Result<(), AcceptError> {
        let handler = self.handler_for(mode).ok_or(AcceptError::UnknownMode)?;
        handler.accept(remote, mode, tags).await
    }

    /// Ask the handler bound to `mode` to forget `remote`.
    pub fn remove(&self, remote: NodeName, mode: Mode) {
        if let Some(handler) = self.handler_for(mode) {
            handler.remove(remote);
        }
    }
}

/// Accept request as sent to a remote dispatcher: "I, the sender, am a
/// runtime of this mode with these tags; accept me."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptRequest {
    pub mode: Mode,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// The wire face of a [`Dispatcher`].
pub struct DispatcherService {
    dispatcher: Dispatcher,
}

impl DispatcherService {
    /// Register the dispatcher's wire face on a node.
    pub fn install(node: &Node, dispatcher: Dispatcher) {
        node.register_service(SERVICE, Arc::new(DispatcherService { dispatcher }));
    }
}

#[async_trait::async_trait]
impl Service for DispatcherService {
    async fn handle(&self, from: NodeName, body: Value) -> Result<Value, RpcError> {
        let request: AcceptRequest =
            serde_json::from_value(body).map_err(RpcError::bad_request)?;
        self.dispatcher
            .dispatch(from, request.mode, request.tags)
            .await
            .map_err(|e| RpcError::handler(e.reason()))?;
        Ok(Value::Null)
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
