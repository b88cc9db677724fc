// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! skitter-remote: the cluster membership substrate.
//!
//! Runtimes find each other over a length-prefixed JSON wire protocol,
//! verify identity through per-node Beacons, and establish membership via
//! the three-phase connect protocol (verify, mode match, double-ended
//! accept). Per-mode handlers own the registry and react to remote death.

pub mod beacon;
pub mod connect;
pub mod dispatcher;
pub mod frame;
pub mod handler;
pub mod handlers;
pub mod node;
pub mod notifier;
pub mod registry;
pub mod tags;
pub mod task;
pub mod wire;

pub use beacon::{Beacon, ProbeReply};
pub use connect::{connect, verify_remote, ConnectError};
pub use dispatcher::{AcceptRequest, Dispatcher, DispatcherService};
pub use frame::{Frame, RpcError};
pub use handler::{spawn_handler, AcceptError, ConnectionHandler, HandlerMsg, HandlerRef};
pub use handlers::{ClusterExit, ExitSender, MasterHandler, RejectHandler, WorkerHandler};
pub use node::{CallError, Node, NodeConfig, Service, TransportError};
pub use notifier::{Notifier, SubscriptionId, WorkerEvent};
pub use registry::Registry;
pub use tags::TagStore;
pub use wire::ProtocolError;
