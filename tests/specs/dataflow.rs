// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dataflow specs: deployments, routing and worker behaviour across
//! whole runtimes.

use crate::prelude::*;
use serde_json::json;
use skitter_core::{flatten, Mode, Workflow};
use skitter_remote::connect;
use skitter_runtime::deploy;

fn doubler_pipeline(runtime: &skitter_runtime::Runtime) -> Workflow {
    Workflow::builder()
        .in_port("in")
        .node("src", "source")
        .node("map", "double")
        .node("out", "sink")
        .link("in", "src.in")
        .link("src.out", "map.in")
        .link("map.out", "out.in")
        .build(runtime.operations())
        .unwrap()
}

/// The canonical end-to-end flow: values into the source come out of the
/// sink doubled, in order.
#[tokio::test]
async fn deployed_pipeline_doubles_its_input() {
    let local = start_local().await;
    let workflow = doubler_pipeline(&local.runtime);
    let reference = deploy(&local.runtime, &workflow).await.unwrap();

    local
        .runtime
        .inject(reference, "in", vec![json!(1), json!(2), json!(3)])
        .await
        .unwrap();
    local.wait_for_values(3).await;
    assert_eq!(local.values(), vec![json!(2), json!(4), json!(6)]);
}

/// Spec law: flatten is semantically transparent — a nested workflow
/// deploys to the same observable behaviour as its flattened form.
#[tokio::test]
async fn flatten_is_semantically_transparent() {
    let nested_runtime = start_local().await;
    let inner = Workflow::builder()
        .in_port("in")
        .out_port("out")
        .node("map", "double")
        .link("in", "map.in")
        .link("map.out", "out")
        .build(nested_runtime.runtime.operations())
        .unwrap();
    let outer = Workflow::builder()
        .in_port("in")
        .node("src", "source")
        .nested("sub", inner)
        .node("out", "sink")
        .link("in", "src.in")
        .link("src.out", "sub.in")
        .link("sub.out", "out.in")
        .build(nested_runtime.runtime.operations())
        .unwrap();

    let inputs = vec![json!(1), json!(2), json!(3)];

    let reference = deploy(&nested_runtime.runtime, &outer).await.unwrap();
    nested_runtime.runtime.inject(reference, "in", inputs.clone()).await.unwrap();
    nested_runtime.wait_for_values(3).await;

    let flat_runtime = start_local().await;
    let flat = flatten(&outer).unwrap();
    let reference = deploy(&flat_runtime.runtime, &flat).await.unwrap();
    flat_runtime.runtime.inject(reference, "in", inputs).await.unwrap();
    flat_runtime.wait_for_values(3).await;

    assert_eq!(nested_runtime.values(), flat_runtime.values());
}

/// Spec scenario: a worker joining after deployment receives the
/// deployment's store entries, and the pipeline keeps serving input.
#[tokio::test]
async fn late_worker_join_replicates_deployments() {
    let w1 = start_worker("w1").await;
    let master = start_master_with(&[&w1]).await;
    let workflow = doubler_pipeline(&master.runtime);
    let reference = deploy(&master.runtime, &workflow).await.unwrap();
    assert!(w1.runtime.store().is_installed(reference));

    // w2 joins after the fact.
    let w2 = start_worker("w2").await;
    let node = master.runtime.node().unwrap();
    connect(node, master.runtime.dispatcher(), w2.runtime.name(), Some(Mode::Worker))
        .await
        .unwrap();

    let replicated = wait_for(5_000, || w2.runtime.store().is_installed(reference)).await;
    assert!(replicated, "late joiner should hold the deployment");
    assert!(w2.runtime.store().links(reference, 0).is_some());

    master
        .runtime
        .inject(reference, "in", vec![json!(1), json!(2), json!(3)])
        .await
        .unwrap();
    master.wait_for_values(3).await;
    assert_eq!(master.values(), vec![json!(2), json!(4), json!(6)]);
}

/// Spec scenario: a crashing callback restarts only its own worker; the
/// values before and after the poison one still flow.
#[tokio::test]
async fn worker_failure_is_isolated() {
    let local = start_local().await;
    let workflow = Workflow::builder()
        .in_port("in")
        .node("src", "source")
        .node("crash", "divide")
        .node("out", "sink")
        .link("in", "src.in")
        .link("src.out", "crash.in")
        .link("crash.out", "out.in")
        .build(local.runtime.operations())
        .unwrap();
    let reference = deploy(&local.runtime, &workflow).await.unwrap();
    let workers_before = local.runtime.workers().count();

    local
        .runtime
        .inject(reference, "in", vec![json!(1), json!(0), json!(2)])
        .await
        .unwrap();
    local.wait_for_values(2).await;

    // 100/1 and 100/2 arrive; 100/0 crashed the divider in between.
    assert_eq!(local.values(), vec![json!(100), json!(50)]);
    assert_eq!(local.runtime.workers().count(), workers_before);
}

/// Removing a deployment tears its workers down everywhere and leaves
/// later input with nowhere to go.
#[tokio::test]
async fn dropped_deployments_stop_serving() {
    let local = start_local().await;
    let workflow = doubler_pipeline(&local.runtime);
    let reference = deploy(&local.runtime, &workflow).await.unwrap();

    skitter_runtime::drop_deployment(&local.runtime, reference).await;
    assert!(!local.runtime.store().is_installed(reference));
    let stopped = wait_for(2_000, || local.runtime.workers().count() == 0).await;
    assert!(stopped, "deployment workers should stop");

    let err = local
        .runtime
        .inject(reference, "in", vec![json!(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, skitter_runtime::SendError::UnknownDeployment(_)));
}

/// Two deployments of the same workflow are independent.
#[tokio::test]
async fn deployments_are_isolated_from_each_other() {
    let local = start_local().await;
    let workflow = doubler_pipeline(&local.runtime);
    let first = deploy(&local.runtime, &workflow).await.unwrap();
    let second = deploy(&local.runtime, &workflow).await.unwrap();
    assert_ne!(first, second);

    skitter_runtime::drop_deployment(&local.runtime, first).await;

    // The second deployment still serves.
    local.runtime.inject(second, "in", vec![json!(21)]).await.unwrap();
    local.wait_for_values(1).await;
    assert_eq!(local.values(), vec![json!(42)]);
}
