// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker membership notifications.
//!
//! Interested processes subscribe for worker_up / worker_down events;
//! notifications are fire-and-forget sends, and a subscriber that went
//! away is pruned on the next send. The deployment distributor uses this
//! to learn of late-joining workers.

use parking_lot::Mutex;
use skitter_core::{NodeName, Tag};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A membership change on the worker set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Up { node: NodeName, tags: Vec<Tag> },
    Down { node: NodeName },
}

/// Handle used to cancel a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

#[derive(Default)]
struct State {
    ups: Vec<Subscriber>,
    downs: Vec<Subscriber>,
    next_id: u64,
}

/// The worker_up / worker_down notifier.
#[derive(Default, Clone)]
pub struct Notifier {
    state: Arc<Mutex<State>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to worker_up events.
    pub fn subscribe_up(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.ups.push(Subscriber { id, tx });
        (id, rx)
    }

    /// Subscribe to worker_down events.
    pub fn subscribe_down(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.downs.push(Subscriber { id, tx });
        (id, rx)
    }

    pub fn unsubscribe_up(&self, id: SubscriptionId) {
        self.state.lock().ups.retain(|s| s.id != id);
    }

    pub fn unsubscribe_down(&self, id: SubscriptionId) {
        self.state.lock().downs.retain(|s| s.id != id);
    }

    /// Announce a new worker. Dead subscribers are dropped.
    pub fn notify_up(&self, node: NodeName, tags: Vec<Tag>) {
        let event = WorkerEvent::Up { node, tags };
        self.state.lock().ups.retain(|s| s.tx.send(event.clone()).is_ok());
    }

    /// Announce a lost worker. Dead subscribers are dropped.
    pub fn notify_down(&self, node: NodeName) {
        let event = WorkerEvent::Down { node };
        self.state.lock().downs.retain(|s| s.tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
