// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-mode handler policies.
//!
//! Masters run a [`WorkerHandler`] for incoming workers, workers run a
//! [`MasterHandler`] for their single master, and every runtime binds a
//! [`RejectHandler`] as the default for modes it does not serve.

mod master;
mod reject;
mod worker;

pub use master::WorkerHandler;
pub use reject::RejectHandler;
pub use worker::MasterHandler;

use skitter_core::NodeName;
use tokio::sync::mpsc;

/// A handler's request to terminate the local runtime, triggered by a
/// shutdown-with-peer policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterExit {
    /// The connected master died and `shutdown_with_master` is set.
    MasterLost(NodeName),
    /// A connected worker died and `shutdown_with_workers` is set.
    WorkerLost(NodeName),
}

/// Channel handlers use to request runtime termination.
pub type ExitSender = mpsc::UnboundedSender<ClusterExit>;
