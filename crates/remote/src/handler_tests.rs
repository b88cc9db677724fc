// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::node::NodeConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

async fn test_node() -> Node {
    Node::spawn(NodeConfig {
        name: "local".to_string(),
        mode: Mode::Master,
        version: "0.2.0".to_string(),
        cookie: "cookie".to_string(),
        tags: Vec::new(),
        bind: "127.0.0.1:0".parse().unwrap(),
    })
    .await
    .unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Accepted(NodeName),
    Removed(NodeName),
    Down(NodeName),
}

struct Recording {
    events: Arc<Mutex<Vec<Event>>>,
    refuse: bool,
}

#[async_trait::async_trait]
impl ConnectionHandler for Recording {
    async fn accept(
        &mut self,
        remote: NodeName,
        _mode: Mode,
        _tags: Vec<Tag>,
    ) -> Result<(), AcceptError> {
        if self.refuse {
            return Err(AcceptError::Rejected("refused".into()));
        }
        self.events.lock().push(Event::Accepted(remote));
        Ok(())
    }

    async fn remove(&mut self, remote: NodeName) {
        self.events.lock().push(Event::Removed(remote));
    }

    async fn down(&mut self, remote: NodeName) {
        self.events.lock().push(Event::Down(remote));
    }
}

fn remote_name(name: &str) -> NodeName {
    NodeName::new(name, "127.0.0.1:1")
}

#[tokio::test]
async fn accept_reaches_the_behavior() {
    let node = test_node().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let handler = spawn_handler(node, Recording { events: Arc::clone(&events), refuse: false });

    handler.accept(remote_name("w1"), Mode::Worker, Vec::new()).await.unwrap();
    assert_eq!(events.lock().first(), Some(&Event::Accepted(remote_name("w1"))));
}

#[tokio::test]
async fn refused_accept_returns_the_reason() {
    let node = test_node().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let handler = spawn_handler(node, Recording { events: Arc::clone(&events), refuse: true });

    let err = handler.accept(remote_name("w1"), Mode::Worker, Vec::new()).await.unwrap_err();
    assert_eq!(err, AcceptError::Rejected("refused".into()));
}

#[tokio::test]
async fn accepting_an_unconnected_remote_fires_down_immediately() {
    // The monitor installed after accept fires at once when no transport
    // connection to the remote exists, mirroring a monitor on a dead node.
    let node = test_node().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let handler = spawn_handler(node, Recording { events: Arc::clone(&events), refuse: false });

    handler.accept(remote_name("w1"), Mode::Worker, Vec::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = events.lock().clone();
    assert_eq!(
        seen,
        vec![Event::Accepted(remote_name("w1")), Event::Down(remote_name("w1"))]
    );
}

#[tokio::test]
async fn remove_is_fire_and_forget() {
    let node = test_node().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let handler = spawn_handler(node, Recording { events: Arc::clone(&events), refuse: false });

    handler.remove(remote_name("w1"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(events.lock().clone(), vec![Event::Removed(remote_name("w1"))]);
}

#[test]
fn accept_error_reasons_roundtrip() {
    for err in [
        AcceptError::UnknownMode,
        AcceptError::AlreadyConnected,
        AcceptError::HasMaster,
        AcceptError::Rejected("custom".into()),
    ] {
        assert_eq!(AcceptError::from_reason(&err.reason()), err);
    }
}
