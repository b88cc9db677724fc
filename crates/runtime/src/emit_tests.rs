// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::deploy::deploy;
use crate::test_support::local_runtime;
use serde_json::json;
use skitter_core::Workflow;

fn emit_map(port: &str, values: Vec<skitter_core::Value>) -> EmitMap {
    let mut map = EmitMap::new();
    map.insert(port.to_string(), values);
    map
}

/// The contexts stored at install time still carry the deploy sentinel;
/// emitting under it is the definition error the sentinel exists for.
#[tokio::test]
#[should_panic(expected = "emit inside a deploy hook")]
async fn emitting_under_the_deploy_sentinel_panics() {
    let fixture = local_runtime().await;
    let workflow = Workflow::builder()
        .node("src", "source")
        .node("out", "sink")
        .link("src.out", "out.in")
        .build(fixture.runtime.operations())
        .unwrap();
    let reference = deploy(&fixture.runtime, &workflow).await.unwrap();

    let ctx = fixture.runtime.store().context(reference, 0).unwrap();
    assert_eq!(ctx.invocation, Invocation::Deploy);
    emit(&fixture.runtime, &ctx, emit_map("out", vec![json!(1)])).await;
}

#[tokio::test]
async fn emitting_into_an_unknown_port_is_ignored() {
    let fixture = local_runtime().await;
    let workflow = Workflow::builder()
        .node("src", "source")
        .node("out", "sink")
        .link("src.out", "out.in")
        .build(fixture.runtime.operations())
        .unwrap();
    let reference = deploy(&fixture.runtime, &workflow).await.unwrap();

    let ctx = fixture
        .runtime
        .store()
        .context(reference, 0)
        .unwrap()
        .with_invocation(Invocation::fresh());
    emit(&fixture.runtime, &ctx, emit_map("bogus", vec![json!(1)])).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(fixture.values().is_empty());
}

#[tokio::test]
async fn fixed_invocations_are_carried_to_every_value() {
    let fixture = local_runtime().await;
    let workflow = Workflow::builder()
        .node("src", "source")
        .node("out", "sink")
        .link("src.out", "out.in")
        .build(fixture.runtime.operations())
        .unwrap();
    let reference = deploy(&fixture.runtime, &workflow).await.unwrap();

    let token = Invocation::fresh();
    let ctx = fixture
        .runtime
        .store()
        .context(reference, 0)
        .unwrap()
        .with_invocation(Invocation::External);
    emit_invocation(
        &fixture.runtime,
        &ctx,
        emit_map("out", vec![json!(1), json!(2)]),
        EmitInvocation::Fixed(token),
    )
    .await;

    fixture.wait_for(2).await;
    let seen = fixture.seen.lock().clone();
    assert_eq!(seen, vec![(json!(1), token), (json!(2), token)]);
}

#[tokio::test]
async fn per_value_invocations_are_minted_per_emission() {
    let fixture = local_runtime().await;
    let workflow = Workflow::builder()
        .node("src", "source")
        .node("out", "sink")
        .link("src.out", "out.in")
        .build(fixture.runtime.operations())
        .unwrap();
    let reference = deploy(&fixture.runtime, &workflow).await.unwrap();

    let ctx = fixture
        .runtime
        .store()
        .context(reference, 0)
        .unwrap()
        .with_invocation(Invocation::External);
    emit_invocation(
        &fixture.runtime,
        &ctx,
        emit_map("out", vec![json!(1), json!(2)]),
        EmitInvocation::PerValue(Invocation::fresh),
    )
    .await;

    fixture.wait_for(2).await;
    let seen = fixture.seen.lock().clone();
    assert_ne!(seen[0].1, seen[1].1);
}
