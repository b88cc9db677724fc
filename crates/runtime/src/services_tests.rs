// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::local_runtime;
use serde_json::json;

#[test]
fn task_requests_roundtrip_through_json() {
    let requests = vec![
        TaskRequest::Stage {
            reference: DeploymentRef::new(),
            nodes: vec![NodeSpec {
                name: "src".to_string(),
                operation: "source".to_string(),
                args: json!({"rate": 10}),
            }],
        },
        TaskRequest::Install {
            reference: DeploymentRef::new(),
            deployment: vec![json!(null)],
            links: vec![vec![vec![LinkDest { component: 0, port: 0 }]]],
            inputs: vec![("in".to_string(), vec![LinkDest { component: 0, port: 0 }])],
        },
        TaskRequest::Remove { reference: DeploymentRef::new() },
        TaskRequest::SpawnWorker {
            reference: DeploymentRef::new(),
            component: 2,
            init: Some(json!(0)),
            tag: Some(Tag::new("gpu")),
        },
    ];
    for request in requests {
        let bytes = serde_json::to_vec(&request).unwrap();
        let back: TaskRequest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, request);
    }
}

#[test]
fn worker_casts_roundtrip_through_json() {
    let casts = vec![
        WorkerCast::Send {
            worker: WorkerId::new(),
            value: json!([1, 2]),
            port: 1,
            invocation: Invocation::fresh(),
        },
        WorkerCast::External { worker: WorkerId::new(), value: json!("line") },
    ];
    for cast in casts {
        let bytes = serde_json::to_vec(&cast).unwrap();
        let back: WorkerCast = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, cast);
    }
}

#[tokio::test]
async fn spawn_from_store_requires_a_staged_deployment() {
    let fixture = local_runtime().await;
    let err = spawn_from_store(
        &fixture.runtime,
        DeploymentRef::new(),
        0,
        WorkerInit::Default,
        None,
    )
    .unwrap_err();
    assert!(err.contains("not staged"));
}

#[tokio::test]
async fn spawn_from_store_spawns_for_staged_components() {
    let fixture = local_runtime().await;
    let reference = DeploymentRef::new();
    let specs = vec![NodeSpec {
        name: "out".to_string(),
        operation: "sink".to_string(),
        args: Value::Null,
    }];
    crate::deploy::apply_stage(&fixture.runtime, reference, &specs).unwrap();

    let worker =
        spawn_from_store(&fixture.runtime, reference, 0, WorkerInit::Default, None).unwrap();
    assert_eq!(&worker.node, fixture.runtime.name());
    assert_eq!(fixture.runtime.workers().count(), 1);

    let err = spawn_from_store(&fixture.runtime, reference, 9, WorkerInit::Default, None)
        .unwrap_err();
    assert!(err.contains("not staged"));
}
