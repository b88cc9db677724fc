// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The immediate strategy: one worker per node, react on every message.
//!
//! The simplest useful strategy and the one the deploy pipeline's tests
//! exercise: `deploy` spawns a single worker (locally under the
//! `immediate` name, on a random worker node under `spread`), `deliver`
//! forwards straight to that worker, and `process` invokes the
//! operation's `react` callback and emits whatever it produced.

use skitter_core::{Invocation, Tag, Value};
use tracing::error;

use crate::emit::{emit_invocation, EmitInvocation};
use crate::placement::{create_worker, Placement};
use crate::runtime::Runtime;
use crate::strategy::{Context, Strategy, WorkerMessage};
use crate::worker::{WorkerInit, WorkerRef};
use crate::deploy::DeployError;

/// Callback every operation driven by this strategy must expose.
const REACT: &str = "react";

/// One worker per component; delivery goes straight to it.
pub struct ImmediateStrategy {
    name: &'static str,
    placement: Placement,
}

impl ImmediateStrategy {
    /// Worker lives on the deploying runtime.
    pub fn local() -> Self {
        Self { name: "immediate", placement: Placement::Local }
    }

    /// Worker lives on a random connected worker node, falling back to
    /// the deploying runtime on a single-node cluster.
    pub fn spread() -> Self {
        Self { name: "spread", placement: Placement::Any }
    }
}

#[async_trait::async_trait]
impl Strategy for ImmediateStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn deploy(&self, runtime: &Runtime, ctx: &Context) -> Result<Value, DeployError> {
        let worker =
            create_worker(runtime, ctx, WorkerInit::Default, None, self.placement.clone())
                .await?;
        // The worker address is all later hooks need.
        serde_json::to_value(worker).map_err(|e| DeployError::Internal(e.to_string()))
    }

    async fn deliver(&self, runtime: &Runtime, ctx: Context, data: Value, port: usize) {
        let worker: WorkerRef = match serde_json::from_value(ctx.deployment.clone()) {
            Ok(worker) => worker,
            Err(e) => {
                error!(operation = ctx.operation.name(), "deployment data is not a worker: {e}");
                return;
            }
        };
        if let Err(e) = runtime.send(&worker, data, port, ctx.invocation) {
            error!(operation = ctx.operation.name(), "delivery failed: {e}");
        }
    }

    async fn process(
        &self,
        runtime: &Runtime,
        ctx: Context,
        message: WorkerMessage,
        state: Value,
        _tag: Option<Tag>,
    ) -> Value {
        let value = match message {
            WorkerMessage::Data { value, .. } => value,
            WorkerMessage::External(value) => value,
            WorkerMessage::RemoteDown(_) => return state,
        };
        let result = match ctx.operation.call(REACT, state, &ctx.args, &[value]) {
            Ok(result) => result,
            Err(e) => {
                error!(operation = ctx.operation.name(), "react failed: {e}");
                return ctx.operation.initial_state();
            }
        };
        if !result.emit.is_empty() {
            // External stimuli mint a fresh invocation per emitted value;
            // everything else inherits the producer's token.
            let invocation = if ctx.invocation == Invocation::External {
                EmitInvocation::PerValue(Invocation::fresh)
            } else {
                EmitInvocation::Inherit
            };
            let emit_map = result.emit;
            emit_invocation(runtime, &ctx, emit_map, invocation).await;
        }
        result.state
    }
}

#[cfg(test)]
#[path = "immediate_tests.rs"]
mod tests;
