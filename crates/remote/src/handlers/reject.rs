// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default handler refusing every connection.

use skitter_core::{Mode, NodeName, Tag};

use crate::handler::{AcceptError, ConnectionHandler};

/// Bound as the fallback for modes a runtime does not serve; local
/// runtimes bind it for everything.
pub struct RejectHandler;

#[async_trait::async_trait]
impl ConnectionHandler for RejectHandler {
    async fn accept(
        &mut self,
        _remote: NodeName,
        mode: Mode,
        _tags: Vec<Tag>,
    ) -> Result<(), AcceptError> {
        Err(AcceptError::Rejected(format!("{mode} connections are not accepted")))
    }

    async fn remove(&mut self, _remote: NodeName) {}

    async fn down(&mut self, _remote: NodeName) {}
}
