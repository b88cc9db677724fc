// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! skitter-runtime: the deployed-workflow execution model.
//!
//! Deployments, per-operation workers, strategy hooks, emit/deliver
//! routing and the master/worker/local lifecycle, built on the
//! `skitter-remote` membership substrate.

#[cfg(test)]
pub(crate) mod test_support;

pub mod config;
pub mod deploy;
pub mod emit;
pub mod lifecycle;
pub mod placement;
pub mod runtime;
pub mod services;
pub mod store;
pub mod strategies;
pub mod strategy;
pub mod worker;

pub use config::{ConfigError, RuntimeConfig, VERSION};
pub use deploy::{deploy, drop_deployment, spawn_distributor, DeployError, NodeSpec};
pub use emit::{emit, emit_invocation, EmitInvocation};
pub use lifecycle::{start, RuntimeError};
pub use placement::{create_worker, Placement, SpawnError};
pub use runtime::{
    Runtime, SendError, EXIT_MASTER_LOST, EXIT_OK, EXIT_STARTUP_FAILED, EXIT_WORKERS_LOST,
};
pub use store::{ComponentStore, LinkDest, LinkTable};
pub use strategies::ImmediateStrategy;
pub use strategy::{Context, DeploymentRef, Strategy, StrategyRegistry, WorkerMessage};
pub use worker::{spawn_worker, WorkerId, WorkerInit, WorkerRef, WorkerTable};
