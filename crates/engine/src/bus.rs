// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed broadcast event bus.
//!
//! Runners publish, the task service's bridge and any external listeners
//! subscribe. Delivery is best-effort: publishing never blocks, and a slow
//! subscriber drops its oldest events (it sees a lag notice, not a stall).

use drover_core::Event;
use tokio::sync::broadcast;

/// Buffered events per subscriber before lag kicks in
const BUS_CAPACITY: usize = 256;

/// Broadcast channel for the typed event union
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish to all current subscribers; a bus with no subscribers
    /// drops the event silently.
    pub fn publish(&self, event: Event) {
        tracing::debug!(event = %event.log_summary(), "publish");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
