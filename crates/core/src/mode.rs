// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DefinitionError;

/// The role a runtime plays in a cluster.
///
/// Set once at startup and immutable afterwards. `Local` runtimes combine
/// the master and worker roles in a single process and accept no remote
/// connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Master,
    Worker,
    Local,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Master => "master",
            Mode::Worker => "worker",
            Mode::Local => "local",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Mode::Master),
            "worker" => Ok(Mode::Worker),
            "local" => Ok(Mode::Local),
            other => Err(DefinitionError::InvalidMode(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
