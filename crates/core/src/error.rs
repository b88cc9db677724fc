// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Definition-time errors and diagnostics.

use std::fmt;
use thiserror::Error;

/// Errors raised while defining operations or workflows. All of these are
/// fatal at definition time and prevent deployment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("invalid node name: {0}")]
    InvalidNodeName(String),

    #[error("operation not registered: {0}")]
    UnknownOperation(String),

    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("workflow has no node named {0}")]
    UnknownNode(String),

    #[error("node {node} has no in-port named {port}")]
    UnknownInPort { node: String, port: String },

    #[error("node {node} has no out-port named {port}")]
    UnknownOutPort { node: String, port: String },

    #[error("workflow has no port named {0}")]
    UnknownWorkflowPort(String),

    #[error("in-port {node}.{port} already has an incoming link")]
    PortAlreadyLinked { node: String, port: String },

    #[error("workflow out-port {0} already has an incoming link")]
    OutPortAlreadyLinked(String),

    #[error("duplicate port name: {0}")]
    DuplicatePort(String),

    #[error("operation {operation} has no callback named {callback}")]
    UnknownCallback { operation: String, callback: String },

    #[error("callback {callback} expects {expected} arguments, got {got}")]
    BadArity { callback: String, expected: usize, got: usize },

    #[error("malformed link endpoint: {0} (expected node.port)")]
    MalformedEndpoint(String),

    #[error("workflow links cycle through nested workflow ports")]
    LinkCycle,
}

/// A non-fatal finding from workflow validation, reported to the deployer.
///
/// The only diagnostic today is an in-port left without an incoming link,
/// which is legal but usually a mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub node: String,
    pub port: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in-port {}.{} is not connected", self.node, self.port)
    }
}
