// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out task execution.
//!
//! Rust cannot ship closures to other machines, so "run this function on
//! a remote" becomes a typed request to a named remote service. A failing
//! remote yields an error in its slot of the result list; aggregation is
//! the caller's business.

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use skitter_core::NodeName;
use std::time::Duration;

use crate::node::{CallError, Node};
use crate::registry::Registry;

/// Run a request on one remote and await its result. Tasks wait as long
/// as the connection lives; pass a bound through [`on_timeout`] to cap
/// them.
pub async fn on<Req, Resp>(
    node: &Node,
    remote: &NodeName,
    service: &str,
    request: &Req,
) -> Result<Resp, CallError>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    node.request_with(remote, service, request, None).await
}

/// Run a request on one remote with a caller-supplied bound.
pub async fn on_timeout<Req, Resp>(
    node: &Node,
    remote: &NodeName,
    service: &str,
    request: &Req,
    timeout: Duration,
) -> Result<Resp, CallError>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    node.request_with(remote, service, request, Some(timeout)).await
}

/// Run a request on many remotes in parallel. The result list is aligned
/// with `remotes`.
pub async fn on_many<Req, Resp>(
    node: &Node,
    remotes: &[NodeName],
    service: &str,
    request: &Req,
) -> Vec<Result<Resp, CallError>>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    join_all(remotes.iter().map(|remote| node.request_with(remote, service, request, None)))
        .await
}

/// Run a request on every connected worker, pairing each result with its
/// node.
pub async fn on_all_workers<Req, Resp>(
    node: &Node,
    registry: &Registry,
    service: &str,
    request: &Req,
) -> Vec<(NodeName, Result<Resp, CallError>)>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    let workers = registry.workers();
    let results = on_many(node, &workers, service, request).await;
    workers.into_iter().zip(results).collect()
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
