// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the workspace specs: a small operation set, an
//! observable sink strategy and ready-made runtimes. Everything here
//! goes through the public API of the skitter crates, the way an
//! embedding application would.

use parking_lot::Mutex;
use serde_json::json;
use skitter_core::{
    CallbackInfo, CallbackResult, Mode, Operation, OperationRegistry, Tag, Value, WorkerSpec,
};
use skitter_runtime::{
    create_worker, Context, DeployError, ImmediateStrategy, Placement, Runtime, RuntimeConfig,
    Strategy, StrategyRegistry, WorkerInit, WorkerMessage, WorkerRef,
};
use std::sync::Arc;
use std::time::Duration;

pub fn pass(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    CallbackResult::unchanged(state).with_emit("out", vec![args[0].clone()])
}

pub fn double(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    let doubled = args[0].as_i64().unwrap_or_default() * 2;
    CallbackResult::unchanged(state).with_emit("out", vec![json!(doubled)])
}

pub fn divide(state: Value, _config: &Value, args: &[Value]) -> CallbackResult {
    let divisor = args[0].as_i64().unwrap();
    CallbackResult::unchanged(state).with_emit("out", vec![json!(100 / divisor)])
}

fn swallow(state: Value, _config: &Value, _args: &[Value]) -> CallbackResult {
    CallbackResult::unchanged(state)
}

/// source → double → sink, plus a crash-on-zero divider.
pub fn operations() -> OperationRegistry {
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
        Operation::builder("divide")
            .in_port("in")
            .out_port("out")
            .strategy("immediate")
            .callback("react", CallbackInfo::emitting(1), divide)
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

/// Sink strategy recording everything its worker processes, in order.
pub struct CollectStrategy {
    pub seen: Arc<Mutex<Vec<Value>>>,
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
        _ctx: Context,
        message: WorkerMessage,
        state: Value,
        _tag: Option<Tag>,
    ) -> Value {
        if let WorkerMessage::Data { value, .. } = message {
            self.seen.lock().push(value);
        }
        state
    }
}

pub fn strategies(seen: Arc<Mutex<Vec<Value>>>) -> StrategyRegistry {
    let strategies = StrategyRegistry::new();
    strategies.register(Arc::new(ImmediateStrategy::local()));
    strategies.register(Arc::new(ImmediateStrategy::spread()));
    strategies.register(Arc::new(CollectStrategy { seen }));
    strategies
}

/// A runtime plus the shared sink observation log.
#[derive(Debug)]
pub struct TestRuntime {
    pub runtime: Runtime,
    pub seen: Arc<Mutex<Vec<Value>>>,
}

impl TestRuntime {
    pub fn values(&self) -> Vec<Value> {
        self.seen.lock().clone()
    }

    pub async fn wait_for_values(&self, count: usize) {
        let reached = wait_for(5_000, || self.seen.lock().len() >= count).await;
        assert!(reached, "sink received {} of {count} values", self.seen.lock().len());
    }
}

pub fn loopback_config(mode: Mode, name: &str) -> RuntimeConfig {
    let mut config = RuntimeConfig::new(mode);
    config.name = name.to_string();
    config.bind = "127.0.0.1:0".parse().unwrap();
    config
}

pub async fn start_with(config: RuntimeConfig) -> Result<TestRuntime, skitter_runtime::RuntimeError>
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runtime =
        skitter_runtime::start(config, operations(), strategies(Arc::clone(&seen))).await?;
    Ok(TestRuntime { runtime, seen })
}

pub async fn start_local() -> TestRuntime {
    start_with(loopback_config(Mode::Local, "local")).await.unwrap()
}

pub async fn start_worker(name: &str) -> TestRuntime {
    start_with(loopback_config(Mode::Worker, name)).await.unwrap()
}

pub async fn start_master_with(workers: &[&TestRuntime]) -> TestRuntime {
    let mut config = loopback_config(Mode::Master, "master");
    config.workers = workers
        .iter()
        .map(|w| WorkerSpec { node: w.runtime.name().clone(), tags: Vec::new() })
        .collect();
    start_with(config).await.unwrap()
}

/// Poll a condition until it holds or the budget runs out.
pub async fn wait_for(budget_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(budget_ms);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
