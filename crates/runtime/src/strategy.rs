// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategies: the pluggable distribution logic of an operation.
//!
//! A strategy decides where workers live (`deploy`), how a value reaches
//! a worker (`deliver`), and what a worker does with it (`process`).
//! These three hooks are the only place distribution decisions are made;
//! the runtime threads a [`Context`] through all of them.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use skitter_core::{Invocation, NodeName, Operation, Tag, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::deploy::DeployError;
use crate::runtime::Runtime;

/// Globally unique identity of an installed deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentRef(Uuid);

impl DeploymentRef {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DeploymentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a worker's mailbox hands to the strategy's `process` hook.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// A value sent through the Skitter send path, addressed to an
    /// in-port.
    Data { value: Value, port: usize },
    /// A message that entered from outside Skitter; processed under
    /// [`Invocation::External`].
    External(Value),
    /// A monitored remote died. Default reaction is nothing.
    RemoteDown(NodeName),
}

/// The identity a strategy hook runs under: operation, per-node args,
/// deployment data, component index, deployment reference and the current
/// invocation. Passed by value; `deliver` overrides the invocation to
/// carry the producer's token to the consumer.
#[derive(Clone)]
pub struct Context {
    pub operation: Arc<Operation>,
    pub strategy: Arc<dyn Strategy>,
    pub args: Value,
    /// Data the strategy's deploy hook returned. `Null` while the deploy
    /// hook itself runs.
    pub deployment: Value,
    pub component: usize,
    pub reference: DeploymentRef,
    pub invocation: Invocation,
}

impl Context {
    pub fn with_invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = invocation;
        self
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("operation", &self.operation.name())
            .field("strategy", &self.strategy.name())
            .field("component", &self.component)
            .field("reference", &self.reference)
            .field("invocation", &self.invocation)
            .finish_non_exhaustive()
    }
}

/// Distribution hooks for one kind of operation.
#[async_trait::async_trait]
pub trait Strategy: Send + Sync {
    /// The name workflows and the wire refer to this strategy by.
    fn name(&self) -> &str;

    /// Install one node of a deployment: spawn workers, build routing
    /// state. The returned value becomes the immutable deployment data
    /// every later hook sees in `ctx.deployment`. Runs under
    /// [`Invocation::Deploy`]; emitting here is a fatal definition error.
    async fn deploy(&self, runtime: &Runtime, ctx: &Context) -> Result<Value, DeployError>;

    /// Move an emitted value to a worker. `ctx.invocation` carries the
    /// producer's token. Must end in some worker's send path and must not
    /// block waiting for processing.
    async fn deliver(&self, runtime: &Runtime, ctx: Context, data: Value, port: usize);

    /// React to a message on a worker: update state, emit, or both.
    async fn process(
        &self,
        runtime: &Runtime,
        ctx: Context,
        message: WorkerMessage,
        state: Value,
        tag: Option<Tag>,
    ) -> Value;
}

/// Process-wide table of strategies, keyed by name.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Strategy>>>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, strategy: Arc<dyn Strategy>) {
        self.inner.write().insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>, DeployError> {
        self.inner
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DeployError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
