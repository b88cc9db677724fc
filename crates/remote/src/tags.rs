// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker tag table, the placement-selection side of the registry.

use parking_lot::RwLock;
use skitter_core::{NodeName, Tag};
use std::collections::HashMap;
use std::sync::Arc;

/// Tags of connected workers. Written by the worker handler alongside the
/// registry; read by placement.
#[derive(Debug, Default, Clone)]
pub struct TagStore {
    inner: Arc<RwLock<HashMap<NodeName, Vec<Tag>>>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, node: NodeName, tags: Vec<Tag>) {
        self.inner.write().insert(node, tags);
    }

    /// Append tags to a node, keeping existing ones.
    pub fn extend(&self, node: NodeName, extra: Vec<Tag>) {
        let mut inner = self.inner.write();
        let tags = inner.entry(node).or_default();
        for tag in extra {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }

    pub fn remove(&self, node: &NodeName) {
        self.inner.write().remove(node);
    }

    pub fn remove_all(&self) {
        self.inner.write().clear();
    }

    /// Tags of one node. Unknown nodes have no tags.
    pub fn of(&self, node: &NodeName) -> Vec<Tag> {
        self.inner.read().get(node).cloned().unwrap_or_default()
    }

    /// All nodes carrying the given tag.
    pub fn with(&self, tag: &Tag) -> Vec<NodeName> {
        self.inner
            .read()
            .iter()
            .filter(|(_, tags)| tags.contains(tag))
            .map(|(node, _)| node.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tests;
