// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `skitter worker`: start a worker runtime.

use clap::Args;
use skitter_core::{Mode, NodeName, Tag, DEFAULT_MASTER_NAME};
use skitter_runtime::RuntimeConfig;

use super::registries;
use crate::exit_error::ExitError;

#[derive(Args)]
pub struct WorkerArgs {
    /// Master to connect to ([name@]host)
    pub master: Option<String>,

    /// Keep running when the connected master goes down
    #[arg(long)]
    pub no_shutdown_with_master: bool,

    /// Tag announced for placement; repeatable
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

pub async fn run(args: WorkerArgs) -> Result<i32, ExitError> {
    let mut config = RuntimeConfig::env_for(Mode::Worker)
        .map_err(|e| ExitError::startup(e.to_string()))?;
    if let Some(master) = &args.master {
        config.master = Some(
            NodeName::parse(master, DEFAULT_MASTER_NAME)
                .map_err(|e| ExitError::startup(e.to_string()))?,
        );
    }
    if args.no_shutdown_with_master {
        config.shutdown_with_master = false;
    }
    config.tags.extend(args.tags.iter().map(Tag::new));

    let (operations, strategies) = registries();
    let runtime = skitter_runtime::start(config, operations, strategies)
        .await
        .map_err(|e| ExitError::startup(e.to_string()))?;
    Ok(runtime.wait().await)
}
