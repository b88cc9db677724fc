// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire faces of the runtime: the `tasks` and `workers` services.
//!
//! `tasks` is the typed stand-in for running a function on a remote
//! runtime: deployment replication, removal and worker spawning arrive
//! here as named requests. `workers` carries the cast-only worker send
//! path; casts from one peer keep their order, which is what gives a
//! single link its per-destination ordering guarantee.

use serde::{Deserialize, Serialize};
use skitter_core::{Invocation, NodeName, Tag, Value};
use skitter_remote::{RpcError, Service};
use std::sync::Arc;
use tracing::debug;

use crate::deploy::{self, NodeSpec};
use crate::runtime::Runtime;
use crate::store::{LinkDest, LinkTable};
use crate::strategy::DeploymentRef;
use crate::worker::{spawn_worker, MailboxMsg, WorkerId, WorkerInit, WorkerRef};

/// Service name for deployment and spawn tasks.
pub const TASKS_SERVICE: &str = "tasks";

/// Service name for the worker send path.
pub const WORKERS_SERVICE: &str = "workers";

/// A task shipped to a remote runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskRequest {
    /// Stage a deployment skeleton in the component store.
    Stage { reference: DeploymentRef, nodes: Vec<NodeSpec> },

    /// Install a staged deployment: deployment data, link tables and
    /// external inputs. Wakes the deployment's local workers.
    Install {
        reference: DeploymentRef,
        deployment: Vec<Value>,
        links: Vec<LinkTable>,
        inputs: Vec<(String, Vec<LinkDest>)>,
    },

    /// Remove a deployment and stop its workers.
    Remove { reference: DeploymentRef },

    /// Spawn a worker for one component. `init` of `None` keeps the
    /// operation's declared initial state lazy.
    SpawnWorker {
        reference: DeploymentRef,
        component: usize,
        init: Option<Value>,
        tag: Option<Tag>,
    },
}

/// Reply to a [`TaskRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskReply {
    Done,
    Worker { worker: WorkerRef },
}

/// The `tasks` service.
pub struct TasksService {
    runtime: Runtime,
}

impl TasksService {
    pub fn install(runtime: &Runtime) {
        if let Some(node) = runtime.node() {
            node.register_service(
                TASKS_SERVICE,
                Arc::new(TasksService { runtime: runtime.clone() }),
            );
        }
    }
}

#[async_trait::async_trait]
impl Service for TasksService {
    async fn handle(&self, from: NodeName, body: Value) -> Result<Value, RpcError> {
        let request: TaskRequest = serde_json::from_value(body).map_err(RpcError::bad_request)?;
        debug!(from = %from, "task request: {request:?}");
        let reply = match request {
            TaskRequest::Stage { reference, nodes } => {
                deploy::apply_stage(&self.runtime, reference, &nodes)
                    .map_err(|e| RpcError::handler(e.to_string()))?;
                TaskReply::Done
            }
            TaskRequest::Install { reference, deployment, links, inputs } => {
                deploy::apply_install(&self.runtime, reference, deployment, links, inputs)
                    .map_err(|e| RpcError::handler(e.to_string()))?;
                TaskReply::Done
            }
            TaskRequest::Remove { reference } => {
                deploy::apply_remove(&self.runtime, reference);
                TaskReply::Done
            }
            TaskRequest::SpawnWorker { reference, component, init, tag } => {
                let worker = spawn_from_store(
                    &self.runtime,
                    reference,
                    component,
                    WorkerInit::from_wire(init),
                    tag,
                )
                .map_err(RpcError::handler)?;
                TaskReply::Worker { worker }
            }
        };
        serde_json::to_value(reply).map_err(RpcError::bad_request)
    }
}

/// Spawn a worker for a component known to the local store.
pub(crate) fn spawn_from_store(
    runtime: &Runtime,
    reference: DeploymentRef,
    component: usize,
    init: WorkerInit,
    tag: Option<Tag>,
) -> Result<WorkerRef, String> {
    let ctx = runtime
        .store()
        .context(reference, component)
        .or_else(|| {
            runtime.store().resolved(reference, component).map(|(node, deployment)| {
                crate::strategy::Context {
                    operation: node.operation,
                    strategy: node.strategy,
                    args: node.args,
                    deployment,
                    component,
                    reference,
                    invocation: Invocation::Deploy,
                }
            })
        })
        .ok_or_else(|| format!("deployment {reference} is not staged here"))?;
    Ok(spawn_worker(runtime, ctx, init, tag))
}

/// A message on the worker send path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCast {
    Send { worker: WorkerId, value: Value, port: usize, invocation: Invocation },
    External { worker: WorkerId, value: Value },
}

/// The `workers` service.
pub struct WorkersService {
    runtime: Runtime,
}

impl WorkersService {
    pub fn install(runtime: &Runtime) {
        if let Some(node) = runtime.node() {
            node.register_service(
                WORKERS_SERVICE,
                Arc::new(WorkersService { runtime: runtime.clone() }),
            );
        }
    }
}

#[async_trait::async_trait]
impl Service for WorkersService {
    async fn handle(&self, _from: NodeName, body: Value) -> Result<Value, RpcError> {
        let cast: WorkerCast = serde_json::from_value(body).map_err(RpcError::bad_request)?;
        let delivered = match cast {
            WorkerCast::Send { worker, value, port, invocation } => self
                .runtime
                .workers()
                .send(worker, MailboxMsg::Send { value, port, invocation }),
            WorkerCast::External { worker, value } => {
                self.runtime.workers().send(worker, MailboxMsg::External(value))
            }
        };
        if !delivered {
            debug!("send for unknown worker dropped");
        }
        Ok(Value::Null)
    }
}

#[cfg(test)]
#[path = "services_tests.rs"]
mod tests;
