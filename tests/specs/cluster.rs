// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster membership specs: the connect protocol, handler policies and
//! failure detection across whole runtimes.

use crate::prelude::*;
use skitter_core::{Mode, Tag};
use skitter_remote::{connect, ConnectError, WorkerEvent};
use skitter_runtime::{RuntimeError, EXIT_MASTER_LOST, EXIT_WORKERS_LOST};
use std::time::Duration;

/// Spec scenario: a caller expecting a worker reaches a master instead.
/// Neither side's registry may retain the other.
#[tokio::test]
async fn mode_mismatch_leaves_no_membership_behind() {
    let caller = start_with(loopback_config(Mode::Worker, "a")).await.unwrap();
    let master = start_with(loopback_config(Mode::Master, "b")).await.unwrap();

    let node = caller.runtime.node().unwrap();
    let err = connect(
        node,
        caller.runtime.dispatcher(),
        master.runtime.name(),
        Some(Mode::Worker),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ConnectError::ModeMismatch { expected: Mode::Worker, actual: Mode::Master, .. }
    ));
    assert!(caller.runtime.registry().all().is_empty());
    assert!(master.runtime.registry().all().is_empty());
}

/// Spec scenario: differing versions refuse to connect and the transport
/// link is torn down again.
#[tokio::test]
async fn version_mismatch_is_incompatible() {
    let mut old = loopback_config(Mode::Master, "old");
    old.version = "1.0".to_string();
    let mut new = loopback_config(Mode::Worker, "new");
    new.version = "2.0".to_string();
    let master = start_with(old).await.unwrap();
    let worker = start_with(new).await.unwrap();

    let node = master.runtime.node().unwrap();
    let err = connect(node, master.runtime.dispatcher(), worker.runtime.name(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectError::Incompatible { .. }));
    assert!(!node.connected(worker.runtime.name()));
    assert!(master.runtime.registry().all().is_empty());
}

/// Spec scenario: a worker accepts one master; a second one is refused
/// with has_master and the first stays in place.
#[tokio::test]
async fn worker_refuses_a_second_master() {
    let worker = start_worker("w").await;
    let m1 = start_with(loopback_config(Mode::Master, "m1")).await.unwrap();
    let m2 = start_with(loopback_config(Mode::Master, "m2")).await.unwrap();

    let m1_node = m1.runtime.node().unwrap();
    let mode = connect(m1_node, m1.runtime.dispatcher(), worker.runtime.name(), None)
        .await
        .unwrap();
    assert_eq!(mode, Mode::Worker);

    let m2_node = m2.runtime.node().unwrap();
    let err = connect(m2_node, m2.runtime.dispatcher(), worker.runtime.name(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectError::HasMaster(_)));

    assert_eq!(worker.runtime.registry().master(), Some(m1.runtime.name().clone()));
    let rolled_back =
        wait_for(2_000, || !m2.runtime.registry().connected(worker.runtime.name())).await;
    assert!(rolled_back, "m2 should roll its local accept back");
}

/// Connect is symmetric: after success each side sees the other.
#[tokio::test]
async fn successful_connect_is_bidirectional() {
    let worker = start_worker("w").await;
    let master = start_master_with(&[&worker]).await;

    assert!(master.runtime.registry().connected(worker.runtime.name()));
    let seen = wait_for(2_000, || {
        worker.runtime.registry().master() == Some(master.runtime.name().clone())
    })
    .await;
    assert!(seen, "worker should see the master in its registry");
}

/// Master startup aggregates per-worker connect failures and refuses to
/// come up when any configured worker is missing.
#[tokio::test]
async fn master_startup_gates_on_all_workers() {
    let good = start_worker("good").await;
    let mut config = loopback_config(Mode::Master, "master");
    config.workers = vec![
        skitter_core::WorkerSpec { node: good.runtime.name().clone(), tags: Vec::new() },
        skitter_core::WorkerSpec::parse("ghost@127.0.0.1:1").unwrap(),
    ];

    let err = start_with(config).await.unwrap_err();
    match err {
        RuntimeError::WorkersFailed(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0.name(), "ghost");
            assert!(matches!(failures[0].1, ConnectError::NotConnected(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Registry reflects remote death: after the worker dies, the master
/// forgets it.
#[tokio::test]
async fn remote_down_clears_the_registry() {
    let worker = start_worker("w").await;
    let master = start_master_with(&[&worker]).await;
    assert!(master.runtime.registry().connected(worker.runtime.name()));

    worker.runtime.shutdown();
    let gone =
        wait_for(2_000, || !master.runtime.registry().connected(worker.runtime.name())).await;
    assert!(gone, "master should forget the dead worker");
}

/// Spec law: subscribe_up(P); connect(W) delivers {worker_up, W, tags}
/// within a bounded time.
#[tokio::test]
async fn subscribers_learn_of_connected_workers() {
    let mut worker_config = loopback_config(Mode::Worker, "w");
    worker_config.tags = vec![Tag::new("gpu")];
    let worker = start_with(worker_config).await.unwrap();

    let master = start_with(loopback_config(Mode::Master, "m")).await.unwrap();
    let (_id, mut up_rx) = master.runtime.notifier().subscribe_up();

    let node = master.runtime.node().unwrap();
    connect(node, master.runtime.dispatcher(), worker.runtime.name(), Some(Mode::Worker))
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), up_rx.recv())
        .await
        .expect("worker_up within bounded time")
        .unwrap();
    assert_eq!(
        event,
        WorkerEvent::Up { node: worker.runtime.name().clone(), tags: vec![Tag::new("gpu")] }
    );
}

/// Worker-side shutdown policy: losing the master terminates the worker
/// with the dedicated exit code.
#[tokio::test]
async fn worker_exits_when_the_master_dies() {
    let worker = start_worker("w").await;
    let master = start_master_with(&[&worker]).await;

    let waiter = {
        let runtime = worker.runtime.clone();
        tokio::spawn(async move { runtime.wait().await })
    };
    master.runtime.shutdown();
    let code = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
    assert_eq!(code, EXIT_MASTER_LOST);
}

/// Master-side shutdown policy: off by default, terminating when
/// enabled.
#[tokio::test]
async fn master_exit_policy_follows_configuration() {
    let worker = start_worker("w").await;
    let mut config = loopback_config(Mode::Master, "m");
    config.workers =
        vec![skitter_core::WorkerSpec { node: worker.runtime.name().clone(), tags: Vec::new() }];
    config.shutdown_with_workers = true;
    let master = start_with(config).await.unwrap();

    let waiter = {
        let runtime = master.runtime.clone();
        tokio::spawn(async move { runtime.wait().await })
    };
    worker.runtime.shutdown();
    let code = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
    assert_eq!(code, EXIT_WORKERS_LOST);
}

/// Local runtimes are not distributed: no node, no connections.
#[tokio::test]
async fn local_runtime_has_no_transport() {
    let local = start_local().await;
    assert!(local.runtime.node().is_none());
    assert!(local.runtime.registry().all().is_empty());
}
