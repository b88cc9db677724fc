// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invocation tokens.
//!
//! An invocation travels with every data item to correlate causally
//! related messages (keyed state, windowing). Strategies decide what to do
//! with it; the runtime only threads it through emit and deliver.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A causal tag carried by an emitted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invocation {
    /// The message entered from outside Skitter (e.g. a line read from a
    /// socket by a source operation).
    External,
    /// Sentinel used while a strategy's deploy hook runs. Emitting under
    /// this invocation is a definition error and panics.
    Deploy,
    /// An opaque identifier carried along the emission graph.
    Id(Uuid),
}

impl Invocation {
    /// Generate a fresh invocation identifier.
    pub fn fresh() -> Self {
        Invocation::Id(Uuid::new_v4())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::External => write!(f, "external"),
            Invocation::Deploy => write!(f, "deploy"),
            Invocation::Id(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
