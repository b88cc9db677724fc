// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connect protocol: establish bidirectional membership between two
//! runtimes.
//!
//! Three phases on top of beacon, dispatcher and handlers:
//!
//! 1. verify: dial the transport, probe the remote beacon, compare
//!    versions (and the expected mode, when the caller has one);
//! 2. local accept: the local handler for the remote's mode takes
//!    ownership of the remote;
//! 3. remote accept: the remote handler for the local mode accepts us; a
//!    refusal rolls the local accept back.
//!
//! The local accept precedes the remote one so the local handler owns the
//! remote before the remote can observe the acceptance. Monitors are
//! installed on both accepts, so a transport failure afterwards fires
//! `remote_down` on exactly one handler per side.

use skitter_core::{Mode, NodeName};
use thiserror::Error;
use tracing::debug;

use crate::beacon::{self, ProbeReply};
use crate::dispatcher::{AcceptRequest, Dispatcher, SERVICE as DISPATCHER_SERVICE};
use crate::frame::RpcError;
use crate::handler::AcceptError;
use crate::node::{CallError, Node, TransportError};

/// Everything that can go wrong while connecting to a remote runtime.
/// Always returned as a value; the caller decides what a failure means.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectError {
    #[error("local runtime is not distributed")]
    NotDistributed,

    #[error("could not connect to {0}")]
    NotConnected(NodeName),

    #[error("{0} is not a skitter runtime")]
    NotSkitter(NodeName),

    #[error("{node} runs version {remote} but the local runtime runs {local}")]
    Incompatible { node: NodeName, local: String, remote: String },

    #[error("expected a {expected} but {node} is a {actual}")]
    ModeMismatch { node: NodeName, expected: Mode, actual: Mode },

    #[error("no handler bound for mode {0}")]
    UnknownMode(Mode),

    #[error("already connected to {0}")]
    AlreadyConnected(NodeName),

    #[error("{0} already has a master")]
    HasMaster(NodeName),

    #[error("connection rejected: {0}")]
    Rejected(String),

    #[error("request to {0} timed out")]
    Timeout(NodeName),
}

impl ConnectError {
    fn from_accept(err: AcceptError, remote: &NodeName, mode: Mode) -> Self {
        match err {
            AcceptError::UnknownMode => ConnectError::UnknownMode(mode),
            AcceptError::AlreadyConnected => ConnectError::AlreadyConnected(remote.clone()),
            AcceptError::HasMaster => ConnectError::HasMaster(remote.clone()),
            AcceptError::Rejected(reason) => ConnectError::Rejected(reason),
        }
    }

    fn from_call(err: CallError, remote: &NodeName, dispatched_mode: Mode) -> Self {
        match err {
            CallError::Rpc(RpcError::NoService { .. }) => ConnectError::NotSkitter(remote.clone()),
            CallError::Rpc(RpcError::Handler { reason }) => {
                let accept = AcceptError::from_reason(&reason);
                ConnectError::from_accept(accept, remote, dispatched_mode)
            }
            CallError::Rpc(RpcError::BadRequest { reason }) => ConnectError::Rejected(reason),
            CallError::Timeout => ConnectError::Timeout(remote.clone()),
            CallError::Transport(_) | CallError::Codec(_) => {
                ConnectError::NotConnected(remote.clone())
            }
        }
    }
}

/// Phase 1: check that `remote` is a reachable, compatible Skitter
/// runtime, and learn its mode.
pub async fn verify_remote(node: &Node, remote: &NodeName) -> Result<ProbeReply, ConnectError> {
    match node.ensure_connected(remote).await {
        Ok(_) => {}
        Err(TransportError::Rejected(reason)) => return Err(ConnectError::Rejected(reason)),
        Err(_) => return Err(ConnectError::NotConnected(remote.clone())),
    }
    let reply = match beacon::probe(node, remote).await {
        Ok(reply) => reply,
        Err(CallError::Rpc(RpcError::NoService { .. })) => {
            node.disconnect(remote);
            return Err(ConnectError::NotSkitter(remote.clone()));
        }
        Err(CallError::Timeout) => return Err(ConnectError::Timeout(remote.clone())),
        Err(_) => return Err(ConnectError::NotConnected(remote.clone())),
    };
    if reply.version != node.version() {
        node.disconnect(remote);
        return Err(ConnectError::Incompatible {
            node: remote.clone(),
            local: node.version().to_string(),
            remote: reply.version,
        });
    }
    Ok(reply)
}

/// Run the full connect protocol against `remote`. On success both sides'
/// handlers own the connection and the remote's mode is returned.
pub async fn connect(
    node: &Node,
    dispatcher: &Dispatcher,
    remote: &NodeName,
    expected_mode: Option<Mode>,
) -> Result<Mode, ConnectError> {
    // Phase 1: identity.
    let probe = verify_remote(node, remote).await?;
    if let Some(expected) = expected_mode {
        if probe.mode != expected {
            return Err(ConnectError::ModeMismatch {
                node: remote.clone(),
                expected,
                actual: probe.mode,
            });
        }
    }

    // Phase 2: the local handler for the remote's mode takes ownership.
    let (_, _, remote_tags) =
        node.peer_info(remote).ok_or_else(|| ConnectError::NotConnected(remote.clone()))?;
    dispatcher
        .dispatch(remote.clone(), probe.mode, remote_tags)
        .await
        .map_err(|e| ConnectError::from_accept(e, remote, probe.mode))?;

    // Phase 3: the remote handler for our mode accepts us; roll back the
    // local accept if it refuses.
    let request = AcceptRequest { mode: node.mode(), tags: node.tags().to_vec() };
    let answer: Result<skitter_core::Value, CallError> =
        node.request(remote, DISPATCHER_SERVICE, &request).await;
    if let Err(err) = answer {
        debug!(remote = %remote, "remote accept failed, rolling back local accept");
        dispatcher.remove(remote.clone(), probe.mode);
        return Err(ConnectError::from_call(err, remote, node.mode()));
    }

    Ok(probe.mode)
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod tests;
