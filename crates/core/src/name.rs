// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node identity: `name@host` strings.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::DefinitionError;
use crate::tag::Tag;

/// Default node name for worker runtimes when `name@` is omitted.
pub const DEFAULT_WORKER_NAME: &str = "skitter_worker";

/// Default node name for master runtimes when `name@` is omitted.
pub const DEFAULT_MASTER_NAME: &str = "skitter_master";

/// A cluster-wide node identity of the form `name@host`.
///
/// The host part carries whatever the transport needs to reach the node
/// (typically `address:port`); the name part disambiguates runtimes sharing
/// a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeName(String);

impl NodeName {
    /// Create a node name from its two parts.
    pub fn new(name: impl AsRef<str>, host: impl AsRef<str>) -> Self {
        Self(format!("{}@{}", name.as_ref(), host.as_ref()))
    }

    /// Parse a `[name@]host` string, substituting `default_name` when the
    /// `name@` part is absent.
    pub fn parse(s: &str, default_name: &str) -> Result<Self, DefinitionError> {
        let (name, host) = match s.split_once('@') {
            Some((name, host)) => (name, host),
            None => (default_name, s),
        };
        if name.is_empty() || host.is_empty() {
            return Err(DefinitionError::InvalidNodeName(s.to_string()));
        }
        Ok(Self::new(name, host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `name` part before the `@`.
    pub fn name(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(n, _)| n)
    }

    /// The `host` part after the `@`.
    pub fn host(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, h)| h)
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for NodeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A worker reference as written on the command line or in
/// `SKITTER_WORKERS`: `[name@]host[:tag,...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub node: NodeName,
    pub tags: Vec<Tag>,
}

impl WorkerSpec {
    /// Parse `[name@]host[:tag1,tag2]`. The tag separator is the last `:`
    /// that is followed by no further `:` so `host:port` addresses survive.
    pub fn parse(s: &str) -> Result<Self, DefinitionError> {
        let (addr, tags) = match s.rsplit_once(':') {
            // A trailing segment with a digit-only value is a port, not a tag list.
            Some((addr, rest)) if !rest.is_empty() && !rest.chars().all(|c| c.is_ascii_digit()) => {
                let tags = rest.split(',').filter(|t| !t.is_empty()).map(Tag::new).collect();
                (addr, tags)
            }
            _ => (s, Vec::new()),
        };
        let node = NodeName::parse(addr, DEFAULT_WORKER_NAME)?;
        Ok(Self { node, tags })
    }
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
