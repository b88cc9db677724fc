// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component store: per-deployment routing state.
//!
//! Two namespaces keyed by `(deployment ref, component index)`: the link
//! tables the emit path walks, and the strategy contexts workers carry.
//! A deployment arrives in two steps — a pending skeleton at replication
//! time, the full entry once deploy data and links exist — and is
//! write-once after install. Removal is the only permitted change.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use skitter_core::{Operation, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::deploy::DeployError;
use crate::strategy::{Context, DeploymentRef, Strategy};

/// One destination of a link: a component and one of its in-ports, both
/// by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDest {
    pub component: usize,
    pub port: usize,
}

/// Out-port index → ordered destinations, for one component.
pub type LinkTable = Vec<Vec<LinkDest>>;

/// A node resolved against the local registries: what `SpawnWorker`
/// requests need before the deployment is finalized.
#[derive(Clone)]
pub(crate) struct ResolvedNode {
    pub name: String,
    pub operation: Arc<Operation>,
    pub strategy: Arc<dyn Strategy>,
    pub args: Value,
}

struct Installed {
    contexts: Vec<Context>,
    links: Vec<LinkTable>,
    /// Workflow in-port name → destinations, for external input.
    inputs: Vec<(String, Vec<LinkDest>)>,
    /// The resolved skeleton, kept for replication to late joiners.
    nodes: Vec<ResolvedNode>,
    /// Per-component deployment data, kept for replication.
    deployment: Vec<Value>,
}

#[derive(Default)]
struct Tables {
    pending: HashMap<DeploymentRef, Vec<ResolvedNode>>,
    installed: HashMap<DeploymentRef, Installed>,
}

/// The process-wide deployment table of one runtime.
#[derive(Default)]
pub struct ComponentStore {
    tables: RwLock<Tables>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the resolved skeleton of a deployment (replication step).
    pub(crate) fn stage(
        &self,
        reference: DeploymentRef,
        nodes: Vec<ResolvedNode>,
    ) -> Result<(), DeployError> {
        let mut tables = self.tables.write();
        if tables.installed.contains_key(&reference) || tables.pending.contains_key(&reference) {
            return Err(DeployError::AlreadyInstalled(reference));
        }
        tables.pending.insert(reference, nodes);
        Ok(())
    }

    /// Promote a staged deployment to installed, fixing its contexts and
    /// link tables. Write-once: later mutation attempts are errors.
    pub(crate) fn install(
        &self,
        reference: DeploymentRef,
        deployment: Vec<Value>,
        links: Vec<LinkTable>,
        inputs: Vec<(String, Vec<LinkDest>)>,
    ) -> Result<(), DeployError> {
        let mut tables = self.tables.write();
        let nodes = tables
            .pending
            .remove(&reference)
            .ok_or(DeployError::UnknownDeployment(reference))?;
        let contexts = nodes
            .iter()
            .enumerate()
            .map(|(component, node)| Context {
                operation: Arc::clone(&node.operation),
                strategy: Arc::clone(&node.strategy),
                args: node.args.clone(),
                deployment: deployment.get(component).cloned().unwrap_or(Value::Null),
                component,
                reference,
                invocation: skitter_core::Invocation::Deploy,
            })
            .collect();
        tables
            .installed
            .insert(reference, Installed { contexts, links, inputs, nodes, deployment });
        Ok(())
    }

    /// Remove a deployment from both namespaces. Returns whether it was
    /// present.
    pub(crate) fn remove(&self, reference: DeploymentRef) -> bool {
        let mut tables = self.tables.write();
        let pending = tables.pending.remove(&reference).is_some();
        let installed = tables.installed.remove(&reference).is_some();
        pending || installed
    }

    /// The link table of one component.
    pub fn links(&self, reference: DeploymentRef, component: usize) -> Option<LinkTable> {
        self.tables
            .read()
            .installed
            .get(&reference)
            .and_then(|entry| entry.links.get(component))
            .cloned()
    }

    /// The stored context of one component.
    pub fn context(&self, reference: DeploymentRef, component: usize) -> Option<Context> {
        self.tables
            .read()
            .installed
            .get(&reference)
            .and_then(|entry| entry.contexts.get(component))
            .cloned()
    }

    /// Resolve a component for spawning, staged or installed.
    pub(crate) fn resolved(
        &self,
        reference: DeploymentRef,
        component: usize,
    ) -> Option<(ResolvedNode, Value)> {
        let tables = self.tables.read();
        if let Some(entry) = tables.installed.get(&reference) {
            return entry.nodes.get(component).map(|node| {
                let data = entry.deployment.get(component).cloned().unwrap_or(Value::Null);
                (node.clone(), data)
            });
        }
        tables
            .pending
            .get(&reference)
            .and_then(|nodes| nodes.get(component))
            .map(|node| (node.clone(), Value::Null))
    }

    /// External entry points of an installed deployment.
    pub(crate) fn inputs(&self, reference: DeploymentRef) -> Option<Vec<(String, Vec<LinkDest>)>> {
        self.tables.read().installed.get(&reference).map(|entry| entry.inputs.clone())
    }

    pub fn is_installed(&self, reference: DeploymentRef) -> bool {
        self.tables.read().installed.contains_key(&reference)
    }

    pub fn is_staged(&self, reference: DeploymentRef) -> bool {
        let tables = self.tables.read();
        tables.pending.contains_key(&reference) || tables.installed.contains_key(&reference)
    }

    /// References of every installed deployment.
    pub fn references(&self) -> Vec<DeploymentRef> {
        self.tables.read().installed.keys().copied().collect()
    }

    /// Snapshot an installed deployment for replication to a late
    /// joiner: `(node specs, deployment data, links, inputs)`.
    pub(crate) fn replication_snapshot(
        &self,
        reference: DeploymentRef,
    ) -> Option<(Vec<ResolvedNode>, Vec<Value>, Vec<LinkTable>, Vec<(String, Vec<LinkDest>)>)>
    {
        self.tables.read().installed.get(&reference).map(|entry| {
            (
                entry.nodes.clone(),
                entry.deployment.clone(),
                entry.links.clone(),
                entry.inputs.clone(),
            )
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
