// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the runtime crate's tests: a small operation set,
//! an observable sink strategy, and single-node / cluster runtimes.

use parking_lot::Mutex;
use serde_json::json;
use skitter_core::{
    CallbackInfo, CallbackResult, Invocation, Mode, Operation, OperationRegistry, Tag, Value,
    WorkerSpec,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::lifecycle;
use crate::placement::{create_worker, Placement};
use crate::runtime::Runtime;
use crate::strategies::ImmediateStrategy;
use crate::strategy::{Context, Strategy, StrategyRegistry, WorkerMessage};
use crate::worker::{WorkerInit, WorkerRef};
use crate::deploy::DeployError;

fn pass(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    CallbackResult::unchanged(state).with_emit("out", vec![args[0].clone()])
}

fn double(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    let doubled = args[0].as_i64().unwrap_or_default() * 2;
    CallbackResult::unchanged(state).with_emit("out", vec![json!(doubled)])
}

fn divide(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    // Panics on zero; the crash-isolation tests feed it one.
    let divisor = args[0].as_i64().unwrap();
    CallbackResult::unchanged(state).with_emit("out", vec![json!(100 / divisor)])
}

fn swallow(state: Value, _config: &Value, _args: &[Value]) -> CallbackResult {
    CallbackResult::unchanged(state)
}

fn accumulate(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    // Panics on non-numeric input; the restart tests rely on it.
    let total = state.as_i64().unwrap_or(0) + args[0].as_i64().unwrap();
    CallbackResult::unchanged(json!(total)).with_emit("out", vec![json!(total)])
}

/// source → double → sink fixtures, plus a crash-on-zero divider.
pub(crate) fn operations() -> OperationRegistry {
    let ops = OperationRegistry::new();
    ops.register(
        Operation::builder("source")
            .in_port("in")
            .out_port("out")
            .strategy("immediate")
            .callback("react", CallbackInfo::emitting(1), pass)
            .build()
            .unwrap(),
    );
    ops.register(
        Operation::builder("double")
            .in_port("in")
            .out_port("out")
            .strategy("immediate")
            .callback("react", CallbackInfo::emitting(1), double)
            .build()
            .unwrap(),
    );
    ops.register(
        Operation::builder("double_spread")
            .in_port("in")
            .out_port("out")
            .strategy("spread")
            .callback("react", CallbackInfo::emitting(1), double)
            .build()
            .unwrap(),
    );
    ops.register(
        Operation::builder("divide")
            .in_port("in")
            .out_port("out")
            .strategy("immediate")
            .callback("react", CallbackInfo::emitting(1), divide)
            .build()
            .unwrap(),
    );
    ops.register(
        Operation::builder("total")
            .in_port("in")
            .out_port("out")
            .strategy("immediate")
            .initial_state(json!(0))
            .callback("react", CallbackInfo::stateful(1).with_emit(), accumulate)
            .build()
            .unwrap(),
    );
    ops.register(
        Operation::builder("sink")
            .in_port("in")
            .strategy("collect")
            .callback("react", CallbackInfo::pure(1), swallow)
            .build()
            .unwrap(),
    );
    ops
}

/// Sink strategy that records everything its worker processes.
pub(crate) struct CollectStrategy {
    pub seen: Arc<Mutex<Vec<(Value, Invocation)>>>,
}

#[async_trait::async_trait]
impl Strategy for CollectStrategy {
    fn name(&self) -> &str {
        "collect"
    }

    async fn deploy(&self, runtime: &Runtime, ctx: &Context) -> Result<Value, DeployError> {
        let worker =
            create_worker(runtime, ctx, WorkerInit::Default, None, Placement::Local).await?;
        serde_json::to_value(worker).map_err(|e| DeployError::Internal(e.to_string()))
    }

    async fn deliver(&self, runtime: &Runtime, ctx: Context, data: Value, port: usize) {
        if let Ok(worker) = serde_json::from_value::<WorkerRef>(ctx.deployment.clone()) {
            let _ = runtime.send(&worker, data, port, ctx.invocation);
        }
    }

    async fn process(
        &self,
        _runtime: &Runtime,
        ctx: Context,
        message: WorkerMessage,
        state: Value,
        _tag: Option<Tag>,
    ) -> Value {
        match message {
            WorkerMessage::Data { value, .. } | WorkerMessage::External(value) => {
                self.seen.lock().push((value, ctx.invocation));
            }
            WorkerMessage::RemoteDown(_) => {}
        }
        state
    }
}

pub(crate) struct Fixture {
    pub runtime: Runtime,
    pub seen: Arc<Mutex<Vec<(Value, Invocation)>>>,
}

impl Fixture {
    pub fn values(&self) -> Vec<Value> {
        self.seen.lock().iter().map(|(v, _)| v.clone()).collect()
    }

    pub async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.seen.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("sink received {} of {count} values", self.seen.lock().len());
    }
}

pub(crate) fn strategies(seen: Arc<Mutex<Vec<(Value, Invocation)>>>) -> StrategyRegistry {
    let strategies = StrategyRegistry::new();
    strategies.register(Arc::new(ImmediateStrategy::local()));
    strategies.register(Arc::new(ImmediateStrategy::spread()));
    strategies.register(Arc::new(CollectStrategy { seen }));
    strategies
}

/// A single-node (local mode) runtime with the fixture registries.
pub(crate) async fn local_runtime() -> Fixture {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime = lifecycle::start(
        RuntimeConfig::new(Mode::Local),
        operations(),
        strategies(Arc::clone(&seen)),
    )
    .await
    .unwrap();
    Fixture { runtime, seen }
}

fn loopback(mut config: RuntimeConfig) -> RuntimeConfig {
    config.bind = "127.0.0.1:0".parse().unwrap();
    config
}

/// A master connected to `workers` worker runtimes, all in-process over
/// loopback, sharing one sink observation log.
pub(crate) async fn cluster(workers: usize) -> (Fixture, Vec<Runtime>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let ops = operations();

    let mut worker_runtimes = Vec::new();
    let mut specs = Vec::new();
    for i in 0..workers {
        let mut config = loopback(RuntimeConfig::new(Mode::Worker));
        config.name = format!("w{i}");
        let runtime =
            lifecycle::start(config, ops.clone(), strategies(Arc::clone(&seen))).await.unwrap();
        specs.push(WorkerSpec { node: runtime.name().clone(), tags: Vec::new() });
        worker_runtimes.push(runtime);
    }

    let mut config = loopback(RuntimeConfig::new(Mode::Master));
    config.workers = specs;
    let master =
        lifecycle::start(config, ops, strategies(Arc::clone(&seen))).await.unwrap();

    (Fixture { runtime: master, seen }, worker_runtimes)
}
