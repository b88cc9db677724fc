// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized configuration and environment variable access for the
//! runtime crate.

use skitter_core::{Mode, NodeName, Tag, WorkerSpec, DEFAULT_MASTER_NAME, DEFAULT_WORKER_NAME};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Runtime version, compared during the connect protocol.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen port when `SKITTER_BIND` is not set.
pub const DEFAULT_PORT: u16 = 7337;

/// Errors from resolving the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SKITTER_MODE is not set")]
    MissingMode,

    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Everything a runtime needs to start.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mode: Mode,
    /// The `name` part of this runtime's `name@host` identity.
    pub name: String,
    pub bind: SocketAddr,
    /// Shared transport cookie; every pair of connecting runtimes must
    /// agree on it.
    pub cookie: String,
    pub version: String,
    /// Master to connect to (worker mode).
    pub master: Option<NodeName>,
    /// Workers to connect to (master mode).
    pub workers: Vec<WorkerSpec>,
    /// Tags this runtime announces (worker mode).
    pub tags: Vec<Tag>,
    /// Terminate when the connected master dies. Default on.
    pub shutdown_with_master: bool,
    /// Terminate when any connected worker dies. Default off.
    pub shutdown_with_workers: bool,
    /// Workflow description to deploy after startup (master/local mode).
    pub deploy: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn new(mode: Mode) -> Self {
        let name = match mode {
            Mode::Master => DEFAULT_MASTER_NAME,
            Mode::Worker => DEFAULT_WORKER_NAME,
            Mode::Local => "skitter",
        };
        Self {
            mode,
            name: name.to_string(),
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            cookie: default_cookie(),
            version: VERSION.to_string(),
            master: None,
            workers: Vec::new(),
            tags: Vec::new(),
            shutdown_with_master: true,
            shutdown_with_workers: false,
            deploy: None,
        }
    }

    /// Resolve the full configuration from `SKITTER_*` environment
    /// variables, as the release bootstrap does.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode: Mode = require("SKITTER_MODE")?
            .parse()
            .map_err(|_| invalid("SKITTER_MODE"))?;
        Self::env_for(mode)
    }

    /// Resolve the configuration for a known mode, reading the remaining
    /// `SKITTER_*` variables. CLI flags override on top of this.
    pub fn env_for(mode: Mode) -> Result<Self, ConfigError> {
        let mut config = Self::new(mode);

        if let Some(master) = var("SKITTER_MASTER") {
            config.master = Some(
                NodeName::parse(&master, DEFAULT_MASTER_NAME)
                    .map_err(|_| ConfigError::Invalid { name: "SKITTER_MASTER", value: master })?,
            );
        }
        if let Some(workers) = var("SKITTER_WORKERS") {
            config.workers = workers
                .split_whitespace()
                .map(WorkerSpec::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| ConfigError::Invalid { name: "SKITTER_WORKERS", value: workers })?;
        }
        if let Some(tags) = var("SKITTER_TAGS") {
            config.tags = tags.split_whitespace().map(Tag::new).collect();
        }
        if var("SKITTER_NO_SHUTDOWN_WITH_MASTER").is_some() {
            config.shutdown_with_master = false;
        }
        if var("SKITTER_SHUTDOWN_WITH_WORKERS").is_some() {
            config.shutdown_with_workers = true;
        }
        if let Some(deploy) = var("SKITTER_DEPLOY") {
            config.deploy = Some(PathBuf::from(deploy));
        }
        if let Some(bind) = var("SKITTER_BIND") {
            config.bind = bind
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "SKITTER_BIND", value: bind })?;
        }
        Ok(config)
    }
}

/// Shared cookie: `SKITTER_COOKIE`, or the well-known development value.
pub fn default_cookie() -> String {
    var("SKITTER_COOKIE").unwrap_or_else(|| "skitter".to_string())
}

/// Whether file logging was requested (`SKITTER_LOG`).
pub fn file_logging() -> Option<PathBuf> {
    var("SKITTER_LOG").map(PathBuf::from)
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    var(name).ok_or(ConfigError::MissingMode)
}

fn invalid(name: &'static str) -> ConfigError {
    ConfigError::Invalid { name, value: var(name).unwrap_or_default() }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
