// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `skitter local`: start a single-node runtime.

use clap::Args;
use skitter_core::Mode;
use skitter_runtime::RuntimeConfig;
use std::path::PathBuf;

use super::{deploy_and_wait, registries};
use crate::exit_error::ExitError;

#[derive(Args)]
pub struct LocalArgs {
    /// Workflow description to deploy at startup
    #[arg(long, value_name = "FILE")]
    pub deploy: Option<PathBuf>,
}

pub async fn run(args: LocalArgs) -> Result<i32, ExitError> {
    let mut config = RuntimeConfig::env_for(Mode::Local)
        .map_err(|e| ExitError::startup(e.to_string()))?;
    let deploy = args.deploy.clone().or(config.deploy.take());

    let (operations, strategies) = registries();
    let runtime = skitter_runtime::start(config, operations, strategies)
        .await
        .map_err(|e| ExitError::startup(e.to_string()))?;
    deploy_and_wait(runtime, deploy.as_deref()).await
}
