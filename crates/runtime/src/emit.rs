// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Emit: publish a callback's emissions along the link tables.
//!
//! For every emitted value the destination strategy's `deliver` hook runs
//! with the destination's context, its invocation overridden with the
//! producer's token. A single emitting worker's values on one port reach
//! every destination in emission order; nothing is ordered across
//! workers.

use skitter_core::{EmitMap, Invocation};
use std::sync::Arc;
use tracing::trace;

use crate::runtime::Runtime;
use crate::strategy::Context;

/// How emitted values pick their invocation.
#[derive(Debug, Clone, Copy)]
pub enum EmitInvocation {
    /// Reuse the emitting context's invocation.
    Inherit,
    /// One fixed invocation for every value.
    Fixed(Invocation),
    /// Call a producer once per emitted value; sources use this to mint a
    /// fresh token per external stimulus.
    PerValue(fn() -> Invocation),
}

/// Emit under the context's own invocation.
pub async fn emit(runtime: &Runtime, ctx: &Context, emit_map: EmitMap) {
    emit_invocation(runtime, ctx, emit_map, EmitInvocation::Inherit).await
}

/// Emit with an explicit invocation choice.
///
/// Ports without a link table entry are skipped silently. Emitting while
/// the context still carries [`Invocation::Deploy`] is a definition error
/// in the operation's strategy and panics with the offending context.
#[allow(clippy::panic)]
pub async fn emit_invocation(
    runtime: &Runtime,
    ctx: &Context,
    emit_map: EmitMap,
    invocation: EmitInvocation,
) {
    if ctx.invocation == Invocation::Deploy {
        panic!("emit inside a deploy hook: {ctx:?}");
    }
    let Some(links) = runtime.store().links(ctx.reference, ctx.component) else {
        return;
    };
    for (port, values) in emit_map {
        let Some(port_idx) = ctx.operation.out_port_index(&port) else {
            continue;
        };
        let Some(dests) = links.get(port_idx) else {
            continue;
        };
        if dests.is_empty() {
            continue;
        }
        for value in values {
            let chosen = match invocation {
                EmitInvocation::Inherit => ctx.invocation,
                EmitInvocation::Fixed(inv) => inv,
                EmitInvocation::PerValue(mint) => mint(),
            };
            trace!(port = %port, invocation = %chosen, "emitting value");
            for dest in dests {
                let Some(dst_ctx) = runtime.store().context(ctx.reference, dest.component)
                else {
                    continue;
                };
                let dst_ctx = dst_ctx.with_invocation(chosen);
                let strategy = Arc::clone(&dst_ctx.strategy);
                strategy.deliver(runtime, dst_ctx, value.clone(), dest.port).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "emit_tests.rs"]
mod tests;
