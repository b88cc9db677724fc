// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker processes.
//!
//! A worker is a task hosting one instance of an operation: a private
//! state cell, an immutable tag, and a mailbox. Messages are processed in
//! arrival order; each `process` invocation runs in its own task so a
//! panicking callback kills only that invocation — the worker keeps its
//! address and restarts with fresh initial state, peers unaffected.
//!
//! Until the worker's deployment is installed in the local component
//! store, data messages are buffered: install happens-before processing.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use skitter_core::{Invocation, NodeName, Tag, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::runtime::Runtime;
use crate::strategy::{Context, DeploymentRef, WorkerMessage};

/// Unique identifier of a worker on its hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cluster-wide worker address: hosting node plus worker id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerRef {
    pub node: NodeName,
    pub id: WorkerId,
}

/// Initial state of a worker.
#[derive(Clone)]
pub enum WorkerInit {
    /// An eager state value.
    Value(Value),
    /// The operation's declared initial state, evaluated lazily on the
    /// first message.
    Default,
    /// A lazy producer, evaluated on the first message. Local only: a
    /// thunk shipped to another node is evaluated at spawn time instead.
    Thunk(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl WorkerInit {
    fn evaluate(&self, ctx: &Context) -> Value {
        match self {
            WorkerInit::Value(value) => value.clone(),
            WorkerInit::Default => ctx.operation.initial_state(),
            WorkerInit::Thunk(thunk) => thunk(),
        }
    }

    /// The eager value to ship across the wire (`None` keeps the
    /// operation default lazy on the far side).
    pub fn into_wire(self) -> Option<Value> {
        match self {
            WorkerInit::Value(value) => Some(value),
            WorkerInit::Default => None,
            WorkerInit::Thunk(thunk) => Some(thunk()),
        }
    }

    pub fn from_wire(init: Option<Value>) -> Self {
        match init {
            Some(value) => WorkerInit::Value(value),
            None => WorkerInit::Default,
        }
    }
}

impl fmt::Debug for WorkerInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerInit::Value(value) => f.debug_tuple("Value").field(value).finish(),
            WorkerInit::Default => write!(f, "Default"),
            WorkerInit::Thunk(_) => write!(f, "Thunk"),
        }
    }
}

/// Mailbox messages of a worker task.
#[derive(Debug)]
pub(crate) enum MailboxMsg {
    /// A value from the Skitter send path.
    Send { value: Value, port: usize, invocation: Invocation },
    /// A message from outside Skitter (sockets, OS resources).
    External(Value),
    /// A monitored remote died.
    RemoteDown(NodeName),
    /// The worker's deployment is installed; drain the buffer.
    Ready,
    /// Tear the worker down.
    Stop,
}

struct WorkerHandle {
    tx: mpsc::UnboundedSender<MailboxMsg>,
    reference: DeploymentRef,
}

/// Table of the workers hosted on this runtime.
#[derive(Default)]
pub struct WorkerTable {
    inner: Mutex<HashMap<WorkerId, WorkerHandle>>,
}

impl WorkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn send(&self, id: WorkerId, msg: MailboxMsg) -> bool {
        match self.inner.lock().get(&id) {
            Some(handle) => handle.tx.send(msg).is_ok(),
            None => false,
        }
    }

    pub(crate) fn sender(&self, id: WorkerId) -> Option<mpsc::UnboundedSender<MailboxMsg>> {
        self.inner.lock().get(&id).map(|handle| handle.tx.clone())
    }

    /// Notify every worker of a deployment that its link tables are
    /// installed.
    pub(crate) fn notify_ready(&self, reference: DeploymentRef) {
        for handle in self.inner.lock().values() {
            if handle.reference == reference {
                let _ = handle.tx.send(MailboxMsg::Ready);
            }
        }
    }

    /// Stop and forget every worker of a deployment.
    pub(crate) fn stop_deployment(&self, reference: DeploymentRef) {
        self.inner.lock().retain(|_, handle| {
            if handle.reference == reference {
                let _ = handle.tx.send(MailboxMsg::Stop);
                false
            } else {
                true
            }
        });
    }

    pub fn count(&self) -> usize {
        self.inner.lock().len()
    }

    fn register(&self, id: WorkerId, handle: WorkerHandle) {
        self.inner.lock().insert(id, handle);
    }

    fn forget(&self, id: WorkerId) {
        self.inner.lock().remove(&id);
    }
}

/// Spawn a worker hosting one instance of `ctx`'s operation.
///
/// The worker is immediately addressable; it starts processing data once
/// its deployment is installed locally.
pub fn spawn_worker(
    runtime: &Runtime,
    ctx: Context,
    init: WorkerInit,
    tag: Option<Tag>,
) -> WorkerRef {
    let id = WorkerId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    runtime
        .workers()
        .register(id, WorkerHandle { tx, reference: ctx.reference });
    debug!(worker = %id, operation = ctx.operation.name(), "spawning worker");
    tokio::spawn(worker_loop(runtime.clone(), id, ctx, init, tag, rx));
    WorkerRef { node: runtime.name().clone(), id }
}

async fn worker_loop(
    runtime: Runtime,
    id: WorkerId,
    ctx: Context,
    init: WorkerInit,
    tag: Option<Tag>,
    mut rx: mpsc::UnboundedReceiver<MailboxMsg>,
) {
    // Lazy state cell: `None` means "evaluate the init on next use",
    // which is also the restart-after-crash state.
    let mut state: Option<Value> = None;
    let mut ready = runtime.store().is_installed(ctx.reference);
    let mut buffer: Vec<MailboxMsg> = Vec::new();

    while let Some(msg) = rx.recv().await {
        match msg {
            MailboxMsg::Stop => break,
            MailboxMsg::Ready => {
                ready = true;
                for buffered in buffer.drain(..) {
                    step(&runtime, id, &ctx, &init, &tag, &mut state, buffered).await;
                }
            }
            other if !ready => buffer.push(other),
            other => step(&runtime, id, &ctx, &init, &tag, &mut state, other).await,
        }
    }
    runtime.workers().forget(id);
    debug!(worker = %id, "worker stopped");
}

/// Process one message, isolating callback panics from the mailbox loop.
async fn step(
    runtime: &Runtime,
    id: WorkerId,
    ctx: &Context,
    init: &WorkerInit,
    tag: &Option<Tag>,
    state: &mut Option<Value>,
    msg: MailboxMsg,
) {
    let (message, invocation) = match msg {
        MailboxMsg::Send { value, port, invocation } => {
            (WorkerMessage::Data { value, port }, invocation)
        }
        MailboxMsg::External(value) => (WorkerMessage::External(value), Invocation::External),
        MailboxMsg::RemoteDown(node) => {
            (WorkerMessage::RemoteDown(node), Invocation::External)
        }
        // Handled by the caller.
        MailboxMsg::Ready | MailboxMsg::Stop => return,
    };

    let current = state.take().unwrap_or_else(|| init.evaluate(ctx));
    let call_ctx = ctx.clone().with_invocation(invocation);
    let strategy = Arc::clone(&ctx.strategy);
    let runtime_clone = runtime.clone();
    let tag = tag.clone();
    let handle = tokio::spawn(async move {
        strategy.process(&runtime_clone, call_ctx, message, current, tag).await
    });
    match handle.await {
        Ok(new_state) => *state = Some(new_state),
        Err(join_err) => {
            // The callback crashed this worker; restart with fresh
            // initial state and keep serving the mailbox.
            error!(worker = %id, operation = ctx.operation.name(),
                "worker crashed, restarting with fresh state: {join_err}");
            *state = None;
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
