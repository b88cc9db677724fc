// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The envelope exchanged between connected runtimes.

use serde::{Deserialize, Serialize};
use skitter_core::{Mode, NodeName, Tag, Value};
use thiserror::Error;

/// One wire message between two runtimes.
///
/// `Hello`/`Welcome`/`Reject` only appear during the handshake; everything
/// after is requests, replies and casts routed by service name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First frame sent by the dialing side.
    Hello { name: NodeName, mode: Mode, version: String, tags: Vec<Tag>, cookie: String },

    /// Accepting side's answer to a valid `Hello`.
    Welcome { name: NodeName, mode: Mode, version: String, tags: Vec<Tag> },

    /// Accepting side's answer to an invalid `Hello`; the socket closes
    /// right after.
    Reject { reason: String },

    /// A synchronous request for the named service; `id` correlates the
    /// reply.
    Request { id: u64, service: String, body: Value },

    /// Reply to a request.
    Reply { id: u64, result: Result<Value, RpcError> },

    /// Fire-and-forget message for the named service. Casts from one
    /// remote are delivered to the service in arrival order.
    Cast { service: String, body: Value },
}

/// Errors a remote service reports back over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum RpcError {
    #[error("no such service: {service}")]
    NoService { service: String },

    #[error("malformed request: {reason}")]
    BadRequest { reason: String },

    #[error("{reason}")]
    Handler { reason: String },
}

impl RpcError {
    pub fn bad_request(err: impl std::fmt::Display) -> Self {
        RpcError::BadRequest { reason: err.to_string() }
    }

    pub fn handler(reason: impl Into<String>) -> Self {
        RpcError::Handler { reason: reason.into() }
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
