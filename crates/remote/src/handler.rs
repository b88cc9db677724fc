// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-mode connection handlers.
//!
//! A handler is a task owning the membership state for one remote mode.
//! It decides whether to accept a connection, tracks what it accepted,
//! and reacts when a remote dies. The spawn loop installs the remote-down
//! monitor after every successful accept, so transport failure reaches
//! exactly one handler per side.

use skitter_core::{Mode, NodeName, Tag};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::node::Node;

/// Why a handler refused a connection. The reason crosses the wire as a
/// plain string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptError {
    /// No handler is bound for the remote's mode.
    UnknownMode,
    /// This remote was already accepted.
    AlreadyConnected,
    /// A different master is already connected.
    HasMaster,
    /// Any other handler-specific refusal.
    Rejected(String),
}

impl AcceptError {
    pub fn reason(&self) -> String {
        match self {
            AcceptError::UnknownMode => "unknown_mode".to_string(),
            AcceptError::AlreadyConnected => "already_connected".to_string(),
            AcceptError::HasMaster => "has_master".to_string(),
            AcceptError::Rejected(msg) => format!("rejected: {msg}"),
        }
    }

    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "unknown_mode" => AcceptError::UnknownMode,
            "already_connected" => AcceptError::AlreadyConnected,
            "has_master" => AcceptError::HasMaster,
            other => {
                AcceptError::Rejected(other.strip_prefix("rejected: ").unwrap_or(other).to_string())
            }
        }
    }
}

impl std::fmt::Display for AcceptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Messages driving a handler task.
#[derive(Debug)]
pub enum HandlerMsg {
    Accept {
        remote: NodeName,
        mode: Mode,
        tags: Vec<Tag>,
        reply: oneshot::Sender<Result<(), AcceptError>>,
    },
    Remove {
        remote: NodeName,
    },
    Down {
        remote: NodeName,
    },
}

/// Mailbox address of a spawned handler.
#[derive(Debug, Clone)]
pub struct HandlerRef {
    tx: mpsc::UnboundedSender<HandlerMsg>,
}

impl HandlerRef {
    /// Ask the handler to accept `remote` and await its verdict.
    pub async fn accept(
        &self,
        remote: NodeName,
        mode: Mode,
        tags: Vec<Tag>,
    ) -> Result<(), AcceptError> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HandlerMsg::Accept { remote, mode, tags, reply }).is_err() {
            return Err(AcceptError::Rejected("handler stopped".into()));
        }
        rx.await.unwrap_or(Err(AcceptError::Rejected("handler stopped".into())))
    }

    /// Ask the handler to forget `remote` (connect-protocol rollback).
    pub fn remove(&self, remote: NodeName) {
        let _ = self.tx.send(HandlerMsg::Remove { remote });
    }

    /// Deliver a remote-down event.
    pub fn down(&self, remote: NodeName) {
        let _ = self.tx.send(HandlerMsg::Down { remote });
    }
}

/// Per-mode handler behaviour.
#[async_trait::async_trait]
pub trait ConnectionHandler: Send + 'static {
    /// Called once when the handler task starts.
    async fn init(&mut self) {}

    /// Decide whether to accept a remote of the bound mode.
    async fn accept(
        &mut self,
        remote: NodeName,
        mode: Mode,
        tags: Vec<Tag>,
    ) -> Result<(), AcceptError>;

    /// Forget an accepted remote without the connection having died.
    async fn remove(&mut self, remote: NodeName);

    /// React to an accepted remote's death.
    async fn down(&mut self, remote: NodeName);
}

/// Spawn a handler task around a behaviour. Successful accepts install a
/// remote-down monitor that routes back into this handler's mailbox.
pub fn spawn_handler<H: ConnectionHandler>(node: Node, mut behavior: H) -> HandlerRef {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor_tx = tx.clone();
    tokio::spawn(async move {
        behavior.init().await;
        while let Some(msg) = rx.recv().await {
            match msg {
                HandlerMsg::Accept { remote, mode, tags, reply } => {
                    let result = behavior.accept(remote.clone(), mode, tags).await;
                    if result.is_ok() {
                        let down_tx = monitor_tx.clone();
                        node.monitor(&remote, move |name| {
                            let _ = down_tx.send(HandlerMsg::Down { remote: name });
                        });
                    }
                    let _ = reply.send(result);
                }
                HandlerMsg::Remove { remote } => {
                    debug!(remote = %remote, "removing connection");
                    behavior.remove(remote).await;
                }
                HandlerMsg::Down { remote } => {
                    debug!(remote = %remote, "remote down");
                    behavior.down(remote).await;
                }
            }
        }
    });
    HandlerRef { tx }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
