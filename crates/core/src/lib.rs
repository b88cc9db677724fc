// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! skitter-core: data model for the Skitter reactive dataflow runtime.
//!
//! Operations, workflows, ports and links, invocation tokens, node
//! identity. Everything here is pure data; networking and execution live
//! in `skitter-remote` and `skitter-runtime`.

pub mod error;
pub mod flatten;
pub mod invocation;
pub mod mode;
pub mod name;
pub mod operation;
pub mod tag;
pub mod workflow;

/// Data flowing through a workflow. Untyped beyond JSON; type-safety is a
/// user concern.
pub type Value = serde_json::Value;

pub use error::{DefinitionError, Diagnostic};
pub use flatten::flatten;
pub use invocation::Invocation;
pub use mode::Mode;
pub use name::{NodeName, WorkerSpec, DEFAULT_MASTER_NAME, DEFAULT_WORKER_NAME};
pub use operation::{
    Callback, CallbackInfo, CallbackResult, EmitMap, Operation, OperationBuilder,
    OperationRegistry,
};
pub use tag::Tag;
pub use workflow::{LinkTarget, Node, NodeKind, Workflow, WorkflowBuilder};
