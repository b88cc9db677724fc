// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker placement: the create_worker interface deploy hooks use.
//!
//! The local backend spawns on this runtime; the cluster backend consults
//! the registry and tag tables, picks a random eligible worker node and
//! spawns there through the task executor.

use skitter_core::{NodeName, Tag};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::runtime::Runtime;
use crate::services::{TaskReply, TaskRequest, TASKS_SERVICE};
use crate::strategy::Context;
use crate::worker::{spawn_worker, WorkerInit, WorkerRef};

/// Where a new worker should live.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    /// On the runtime running the deploy hook.
    #[default]
    Local,
    /// On one specific node.
    On(NodeName),
    /// On a random worker carrying every one of these tags.
    Tagged(Vec<Tag>),
    /// On a random connected worker; falls back to local when the
    /// runtime has no workers (single-node operation).
    Any,
}

/// Errors from placing a worker.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no eligible node for placement")]
    NoEligibleNode,

    #[error("local runtime is not distributed")]
    NotDistributed,

    #[error("spawn on {node} failed: {reason}")]
    Remote { node: NodeName, reason: String },
}

/// Create a worker for the context's component, honoring the placement
/// hint. Returns the new worker's cluster-wide address.
pub async fn create_worker(
    runtime: &Runtime,
    ctx: &Context,
    init: WorkerInit,
    tag: Option<Tag>,
    placement: Placement,
) -> Result<WorkerRef, SpawnError> {
    let target = match placement {
        Placement::Local => None,
        Placement::On(node) if node == *runtime.name() => None,
        Placement::On(node) => Some(node),
        Placement::Tagged(tags) => Some(pick_tagged(runtime, &tags)?),
        Placement::Any => pick_any(runtime),
    };

    match target {
        None => Ok(spawn_worker(runtime, ctx.clone(), init, tag)),
        Some(remote) => spawn_remote(runtime, ctx, init, tag, remote).await,
    }
}

async fn spawn_remote(
    runtime: &Runtime,
    ctx: &Context,
    init: WorkerInit,
    tag: Option<Tag>,
    remote: NodeName,
) -> Result<WorkerRef, SpawnError> {
    let Some(node) = runtime.node() else {
        return Err(SpawnError::NotDistributed);
    };
    debug!(operation = ctx.operation.name(), node = %remote, "spawning remote worker");
    let request = TaskRequest::SpawnWorker {
        reference: ctx.reference,
        component: ctx.component,
        init: init.into_wire(),
        tag,
    };
    let reply: TaskReply = skitter_remote::task::on(node, &remote, TASKS_SERVICE, &request)
        .await
        .map_err(|e| SpawnError::Remote { node: remote.clone(), reason: e.to_string() })?;
    match reply {
        TaskReply::Worker { worker } => Ok(worker),
        TaskReply::Done => {
            Err(SpawnError::Remote { node: remote, reason: "unexpected reply".to_string() })
        }
    }
}

fn pick_tagged(runtime: &Runtime, tags: &[Tag]) -> Result<NodeName, SpawnError> {
    let mut candidates: Option<Vec<NodeName>> = None;
    for tag in tags {
        let nodes = runtime.tags().with(tag);
        candidates = Some(match candidates {
            None => nodes,
            Some(current) => current.into_iter().filter(|n| nodes.contains(n)).collect(),
        });
    }
    let candidates = candidates.unwrap_or_else(|| runtime.registry().workers());
    pick_random(&candidates).ok_or(SpawnError::NoEligibleNode)
}

fn pick_any(runtime: &Runtime) -> Option<NodeName> {
    pick_random(&runtime.registry().workers())
}

/// Uniform-ish pick without a dedicated RNG dependency: UUIDs already
/// give us cheap entropy.
fn pick_random(nodes: &[NodeName]) -> Option<NodeName> {
    if nodes.is_empty() {
        return None;
    }
    let index = (Uuid::new_v4().as_u128() % nodes.len() as u128) as usize;
    nodes.get(index).cloned()
}

#[cfg(test)]
#[path = "placement_tests.rs"]
mod tests;
