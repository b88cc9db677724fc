// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `skitter deploy`: bring a cluster up and deploy in one step.
//!
//! The release script starts the remote worker runtimes; this command
//! runs the master side: connect every listed worker, gate on all of
//! them, deploy the workflow and keep running.

use clap::Args;
use skitter_core::Mode;
use skitter_runtime::RuntimeConfig;
use std::path::PathBuf;

use super::{deploy_and_wait, master::parse_workers, registries};
use crate::exit_error::ExitError;

#[derive(Args)]
pub struct DeployArgs {
    /// Workers to connect to ([name@]host[:tag,...])
    pub workers: Vec<String>,

    /// Workflow description to deploy once the cluster is up
    #[arg(long, value_name = "FILE")]
    pub deploy: Option<PathBuf>,

    /// Terminate when any connected worker goes down
    #[arg(long)]
    pub shutdown_with_workers: bool,
}

pub async fn run(args: DeployArgs) -> Result<i32, ExitError> {
    let mut config = RuntimeConfig::env_for(Mode::Master)
        .map_err(|e| ExitError::startup(e.to_string()))?;
    if !args.workers.is_empty() {
        config.workers = parse_workers(&args.workers)?;
    }
    if args.shutdown_with_workers {
        config.shutdown_with_workers = true;
    }
    let deploy = args.deploy.clone().or(config.deploy.take());

    let (operations, strategies) = registries();
    let runtime = skitter_runtime::start(config, operations, strategies)
        .await
        .map_err(|e| ExitError::startup(e.to_string()))?;
    deploy_and_wait(runtime, deploy.as_deref()).await
}
