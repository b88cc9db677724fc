// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The deploy pipeline.
//!
//! Deploying a workflow on a master (or local) runtime: flatten, assign
//! dense component indices in flatten order, replicate the skeleton to
//! every connected worker, run each node's strategy deploy hook, resolve
//! links to index-addressed tables, install everywhere and wake the
//! deployment's workers. A distributor task replays installed deployments
//! to late-joining workers; when that replication fails the deployment
//! stays live on the existing workers and the new one is excluded.

use serde::{Deserialize, Serialize};
use skitter_core::{
    flatten, DefinitionError, Invocation, LinkTarget, Mode, NodeKind, NodeName, Value, Workflow,
};
use skitter_remote::{task, WorkerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::placement::SpawnError;
use crate::runtime::Runtime;
use crate::services::{TaskReply, TaskRequest, TASKS_SERVICE};
use crate::store::{LinkDest, LinkTable, ResolvedNode};
use crate::strategy::{Context, DeploymentRef};

/// Errors from deploying or removing a workflow.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("strategy not registered: {0}")]
    UnknownStrategy(String),

    #[error("deployment {0} is already installed")]
    AlreadyInstalled(DeploymentRef),

    #[error("deployment {0} is not staged")]
    UnknownDeployment(DeploymentRef),

    #[error("replication to {node} failed: {reason}")]
    Replication { node: NodeName, reason: String },

    #[error("cannot deploy from a {0} runtime")]
    WrongMode(Mode),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("internal: {0}")]
    Internal(String),
}

/// One node of a deployment as it crosses the wire: operation by name,
/// component index implied by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub operation: String,
    #[serde(default)]
    pub args: Value,
}

/// Deploy a workflow, returning its fresh deployment reference.
pub async fn deploy(runtime: &Runtime, workflow: &Workflow) -> Result<DeploymentRef, DeployError> {
    if runtime.mode() == Mode::Worker {
        return Err(DeployError::WrongMode(runtime.mode()));
    }

    // 1. Flatten, then surface what validation has to say.
    let flat = flatten(workflow)?;
    for diagnostic in flat.validate(runtime.operations())? {
        warn!("{diagnostic}");
    }

    // 2–3. Fresh reference; dense component indices in flatten order.
    let reference = DeploymentRef::new();
    let specs = node_specs(&flat)?;
    let nodes = resolve_nodes(runtime, &specs)?;

    // 4. Replicate the skeleton to every connected worker.
    runtime.store().stage(reference, nodes.clone())?;
    if let Some(node) = runtime.node() {
        let request = TaskRequest::Stage { reference, nodes: specs.clone() };
        let results =
            task::on_all_workers::<_, TaskReply>(node, runtime.registry(), TASKS_SERVICE, &request)
                .await;
        for (worker, result) in results {
            if let Err(e) = result {
                remove_everywhere(runtime, reference).await;
                return Err(DeployError::Replication { node: worker, reason: e.to_string() });
            }
        }
    }

    // 5. Run the strategy deploy hooks.
    let deployment = match run_deploy_hooks(runtime, reference, &nodes).await {
        Ok(deployment) => deployment,
        Err(e) => {
            remove_everywhere(runtime, reference).await;
            return Err(e);
        }
    };

    // 6. Resolve links to index-addressed tables.
    let (links, inputs) = resolve_links(&flat, &nodes)?;

    // 7. Install everywhere; each runtime wakes its own workers.
    apply_install(runtime, reference, deployment.clone(), links.clone(), inputs.clone())?;
    if let Some(node) = runtime.node() {
        let request = TaskRequest::Install { reference, deployment, links, inputs };
        let results =
            task::on_all_workers::<_, TaskReply>(node, runtime.registry(), TASKS_SERVICE, &request)
                .await;
        for (worker, result) in results {
            if let Err(e) = result {
                remove_everywhere(runtime, reference).await;
                return Err(DeployError::Replication { node: worker, reason: e.to_string() });
            }
        }
    }

    info!(%reference, nodes = specs.len(), "deployment installed");
    Ok(reference)
}

/// Remove a deployment everywhere: stop its workers and drop its store
/// entries on this runtime and every connected worker.
pub async fn drop_deployment(runtime: &Runtime, reference: DeploymentRef) {
    remove_everywhere(runtime, reference).await;
}

async fn remove_everywhere(runtime: &Runtime, reference: DeploymentRef) {
    apply_remove(runtime, reference);
    if let Some(node) = runtime.node() {
        let request = TaskRequest::Remove { reference };
        let results =
            task::on_all_workers::<_, TaskReply>(node, runtime.registry(), TASKS_SERVICE, &request)
                .await;
        for (worker, result) in results {
            if let Err(e) = result {
                warn!(%reference, worker = %worker, "removal failed: {e}");
            }
        }
    }
}

fn node_specs(flat: &Workflow) -> Result<Vec<NodeSpec>, DeployError> {
    let mut specs = Vec::with_capacity(flat.nodes.len());
    for (name, node) in &flat.nodes {
        let NodeKind::Operation { operation } = &node.kind else {
            return Err(DeployError::Internal(format!("node {name} survived flattening")));
        };
        specs.push(NodeSpec {
            name: name.clone(),
            operation: operation.clone(),
            args: node.args.clone(),
        });
    }
    Ok(specs)
}

pub(crate) fn resolve_nodes(
    runtime: &Runtime,
    specs: &[NodeSpec],
) -> Result<Vec<ResolvedNode>, DeployError> {
    specs
        .iter()
        .map(|spec| {
            let operation = runtime.operations().get(&spec.operation)?;
            let strategy = runtime.strategies().get(operation.strategy())?;
            Ok(ResolvedNode {
                name: spec.name.clone(),
                operation,
                strategy,
                args: spec.args.clone(),
            })
        })
        .collect()
}

async fn run_deploy_hooks(
    runtime: &Runtime,
    reference: DeploymentRef,
    nodes: &[ResolvedNode],
) -> Result<Vec<Value>, DeployError> {
    let mut deployment = Vec::with_capacity(nodes.len());
    for (component, resolved) in nodes.iter().enumerate() {
        let ctx = Context {
            operation: Arc::clone(&resolved.operation),
            strategy: Arc::clone(&resolved.strategy),
            args: resolved.args.clone(),
            deployment: Value::Null,
            component,
            reference,
            invocation: Invocation::Deploy,
        };
        debug!(node = resolved.name, component, "running deploy hook");
        let data = resolved.strategy.deploy(runtime, &ctx).await?;
        deployment.push(data);
    }
    Ok(deployment)
}

fn resolve_links(
    flat: &Workflow,
    nodes: &[ResolvedNode],
) -> Result<(Vec<LinkTable>, Vec<(String, Vec<LinkDest>)>), DeployError> {
    let index_of: HashMap<&str, usize> =
        flat.nodes.keys().enumerate().map(|(i, name)| (name.as_str(), i)).collect();

    let resolve_target = |target: &LinkTarget| -> Result<Option<LinkDest>, DeployError> {
        match target {
            LinkTarget::Node { node, port } => {
                let component = *index_of
                    .get(node.as_str())
                    .ok_or_else(|| DefinitionError::UnknownNode(node.clone()))?;
                let port_idx = nodes
                    .get(component)
                    .and_then(|n| n.operation.in_port_index(port))
                    .ok_or_else(|| DefinitionError::UnknownInPort {
                        node: node.clone(),
                        port: port.clone(),
                    })?;
                Ok(Some(LinkDest { component, port: port_idx }))
            }
            // A top-level workflow out-port has nowhere further to go.
            LinkTarget::Out { .. } => Ok(None),
        }
    };

    let mut links = Vec::with_capacity(nodes.len());
    for (component, node) in flat.nodes.values().enumerate() {
        let out_ports = nodes
            .get(component)
            .map(|n| n.operation.out_ports().len())
            .unwrap_or_default();
        let mut table: LinkTable = vec![Vec::new(); out_ports];
        for (port, targets) in &node.links {
            let Some(port_idx) =
                nodes.get(component).and_then(|n| n.operation.out_port_index(port))
            else {
                continue;
            };
            for target in targets {
                if let Some(dest) = resolve_target(target)? {
                    table[port_idx].push(dest);
                }
            }
        }
        links.push(table);
    }

    let mut inputs = Vec::with_capacity(flat.in_ports.len());
    for (port, targets) in &flat.in_ports {
        let mut dests = Vec::new();
        for target in targets {
            if let Some(dest) = resolve_target(target)? {
                dests.push(dest);
            }
        }
        inputs.push((port.clone(), dests));
    }

    Ok((links, inputs))
}

/// Stage a replicated skeleton (remote side of deploy step 4).
pub(crate) fn apply_stage(
    runtime: &Runtime,
    reference: DeploymentRef,
    specs: &[NodeSpec],
) -> Result<(), DeployError> {
    let nodes = resolve_nodes(runtime, specs)?;
    runtime.store().stage(reference, nodes)
}

/// Install a staged deployment and wake its local workers (remote side
/// of deploy step 7).
pub(crate) fn apply_install(
    runtime: &Runtime,
    reference: DeploymentRef,
    deployment: Vec<Value>,
    links: Vec<LinkTable>,
    inputs: Vec<(String, Vec<LinkDest>)>,
) -> Result<(), DeployError> {
    runtime.store().install(reference, deployment, links, inputs)?;
    runtime.workers().notify_ready(reference);
    Ok(())
}

/// Drop a deployment's local state and stop its workers.
pub(crate) fn apply_remove(runtime: &Runtime, reference: DeploymentRef) {
    runtime.store().remove(reference);
    runtime.workers().stop_deployment(reference);
}

/// Start the deployment distributor: replicate every installed
/// deployment to workers that join later.
pub fn spawn_distributor(runtime: &Runtime) {
    let runtime = runtime.clone();
    let (_id, mut rx) = runtime.notifier().subscribe_up();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let WorkerEvent::Up { node: joined, .. } = event else { continue };
            replicate_all(&runtime, &joined).await;
        }
    });
}

/// Push every installed deployment to one newly joined worker. Failures
/// are logged; the deployment stays live on the existing workers and the
/// new worker is excluded from it.
async fn replicate_all(runtime: &Runtime, joined: &NodeName) {
    let Some(node) = runtime.node() else { return };
    for reference in runtime.store().references() {
        let Some((nodes, deployment, links, inputs)) =
            runtime.store().replication_snapshot(reference)
        else {
            continue;
        };
        let specs: Vec<NodeSpec> = nodes
            .iter()
            .map(|n| NodeSpec {
                name: n.name.clone(),
                operation: n.operation.name().to_string(),
                args: n.args.clone(),
            })
            .collect();

        let stage = TaskRequest::Stage { reference, nodes: specs };
        if let Err(e) = task::on::<_, TaskReply>(node, joined, TASKS_SERVICE, &stage).await {
            warn!(%reference, worker = %joined, "replication failed, excluding worker: {e}");
            continue;
        }
        let install = TaskRequest::Install { reference, deployment, links, inputs };
        match task::on::<_, TaskReply>(node, joined, TASKS_SERVICE, &install).await {
            Ok(_) => info!(%reference, worker = %joined, "deployment replicated"),
            Err(e) => {
                warn!(%reference, worker = %joined, "replication failed, excluding worker: {e}")
            }
        }
    }
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
