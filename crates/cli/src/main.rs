// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! skitter: launch a Skitter runtime from the command line.

mod commands;
mod exit_error;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skitter", version, about = "Skitter reactive dataflow runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a worker runtime
    Worker(commands::worker::WorkerArgs),
    /// Start a master runtime
    Master(commands::master::MasterArgs),
    /// Start a single-node runtime without networking
    Local(commands::local::LocalArgs),
    /// Start a master, connect workers and deploy a workflow
    Deploy(commands::deploy::DeployArgs),
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("skitter: failed to start async runtime: {e}");
            std::process::exit(skitter_runtime::EXIT_STARTUP_FAILED);
        }
    };
    let result = runtime.block_on(async {
        match cli.command {
            Commands::Worker(args) => commands::worker::run(args).await,
            Commands::Master(args) => commands::master::run(args).await,
            Commands::Local(args) => commands::local::run(args).await,
            Commands::Deploy(args) => commands::deploy::run(args).await,
        }
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(ExitError { code, message }) => {
            eprintln!("skitter: {message}");
            std::process::exit(code);
        }
    }
}

/// Console logging, plus a non-blocking file sink when `SKITTER_LOG` is
/// set. The returned guard must outlive main for the file sink to flush.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match skitter_runtime::config::file_logging() {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path.file_name().map(std::path::PathBuf::from).unwrap_or_else(|| {
                std::path::PathBuf::from("skitter.log")
            });
            let appender = tracing_appender::rolling::never(directory, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
