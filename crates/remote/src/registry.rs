// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Membership registry.
//!
//! A read-optimised table of connected remotes. Only the per-mode
//! handlers write; readers get a consistent snapshot per call.

use parking_lot::RwLock;
use skitter_core::{Mode, NodeName};
use std::collections::HashMap;
use std::sync::Arc;

/// Connected remotes and their modes.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<NodeName, Mode>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, node: NodeName, mode: Mode) {
        self.inner.write().insert(node, mode);
    }

    pub fn remove(&self, node: &NodeName) {
        self.inner.write().remove(node);
    }

    pub fn remove_all(&self) {
        self.inner.write().clear();
    }

    /// All connected remotes, in no particular order.
    pub fn all(&self) -> Vec<NodeName> {
        self.inner.read().keys().cloned().collect()
    }

    /// The connected master, if any.
    pub fn master(&self) -> Option<NodeName> {
        self.inner
            .read()
            .iter()
            .find(|(_, mode)| **mode == Mode::Master)
            .map(|(node, _)| node.clone())
    }

    /// All connected workers.
    pub fn workers(&self) -> Vec<NodeName> {
        self.inner
            .read()
            .iter()
            .filter(|(_, mode)| **mode == Mode::Worker)
            .map(|(node, _)| node.clone())
            .collect()
    }

    pub fn connected(&self, node: &NodeName) -> bool {
        self.inner.read().contains_key(node)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
