// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::frame::RpcError;
use crate::node::{NodeConfig, Service, TransportError};
use skitter_core::{Mode, Value};
use std::sync::Arc;

async fn test_node(name: &str, mode: Mode) -> Node {
    Node::spawn(NodeConfig {
        name: name.to_string(),
        mode,
        version: "0.2.0".to_string(),
        cookie: "cookie".to_string(),
        tags: Vec::new(),
        bind: "127.0.0.1:0".parse().unwrap(),
    })
    .await
    .unwrap()
}

/// Doubles the number it is sent; the test stand-in for a shipped task.
struct Doubler;

#[async_trait::async_trait]
impl Service for Doubler {
    async fn handle(&self, _from: NodeName, body: Value) -> Result<Value, RpcError> {
        let n = body.as_i64().ok_or_else(|| RpcError::bad_request("expected a number"))?;
        Ok(Value::from(n * 2))
    }
}

#[tokio::test]
async fn on_runs_a_task_on_one_remote() {
    let master = test_node("m", Mode::Master).await;
    let worker = test_node("w", Mode::Worker).await;
    worker.register_service("tasks", Arc::new(Doubler));
    master.ensure_connected(worker.name()).await.unwrap();

    let result: i64 = on(&master, worker.name(), "tasks", &21i64).await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn on_many_keeps_result_order() {
    let master = test_node("m", Mode::Master).await;
    let w1 = test_node("w1", Mode::Worker).await;
    let w2 = test_node("w2", Mode::Worker).await;
    for worker in [&w1, &w2] {
        worker.register_service("tasks", Arc::new(Doubler));
        master.ensure_connected(worker.name()).await.unwrap();
    }

    let remotes = vec![w1.name().clone(), w2.name().clone()];
    let results: Vec<Result<i64, _>> = on_many(&master, &remotes, "tasks", &5i64).await;
    assert_eq!(results.len(), 2);
    assert_eq!(*results[0].as_ref().unwrap(), 10);
    assert_eq!(*results[1].as_ref().unwrap(), 10);
}

#[tokio::test]
async fn a_failing_remote_fills_its_own_slot() {
    let master = test_node("m", Mode::Master).await;
    let good = test_node("w1", Mode::Worker).await;
    good.register_service("tasks", Arc::new(Doubler));
    master.ensure_connected(good.name()).await.unwrap();
    let ghost = NodeName::new("ghost", "127.0.0.1:1");

    let remotes = vec![good.name().clone(), ghost];
    let results: Vec<Result<i64, _>> = on_many(&master, &remotes, "tasks", &3i64).await;
    assert_eq!(*results[0].as_ref().unwrap(), 6);
    assert!(matches!(
        results[1].as_ref().unwrap_err(),
        CallError::Transport(TransportError::NotConnected(_))
    ));
}

/// Replies after a delay, to exercise caller-supplied bounds.
struct Slow;

#[async_trait::async_trait]
impl Service for Slow {
    async fn handle(&self, _from: NodeName, body: Value) -> Result<Value, RpcError> {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        Ok(body)
    }
}

#[tokio::test]
async fn on_timeout_caps_a_slow_task() {
    let master = test_node("m", Mode::Master).await;
    let worker = test_node("w", Mode::Worker).await;
    worker.register_service("tasks", Arc::new(Slow));
    master.ensure_connected(worker.name()).await.unwrap();

    let err = on_timeout::<_, Value>(
        &master,
        worker.name(),
        "tasks",
        &1i64,
        std::time::Duration::from_millis(50),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CallError::Timeout));
}

#[tokio::test]
async fn on_all_workers_uses_the_registry() {
    let master = test_node("m", Mode::Master).await;
    let w1 = test_node("w1", Mode::Worker).await;
    let w2 = test_node("w2", Mode::Worker).await;
    let registry = Registry::new();
    for worker in [&w1, &w2] {
        worker.register_service("tasks", Arc::new(Doubler));
        master.ensure_connected(worker.name()).await.unwrap();
        registry.add(worker.name().clone(), Mode::Worker);
    }
    registry.add(master.name().clone(), Mode::Master);

    let results: Vec<(NodeName, Result<i64, _>)> =
        on_all_workers(&master, &registry, "tasks", &1i64).await;
    // Only the workers are addressed, not the master itself.
    assert_eq!(results.len(), 2);
    for (_, result) in results {
        assert_eq!(result.unwrap(), 2);
    }
}
