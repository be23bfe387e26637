// src/pipeline/event_bus.rs
//
// Decoupled event system. The route state engine publishes what changed;
// the refresh scheduler decides what to fetch. State mutation never
// performs I/O itself.

use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    /// Route identity changed: new upload, load, or optimize result.
    /// In-flight responses for the previous route are now stale.
    RouteReplaced { generation: u64 },

    /// Structure changed in place: order, membership, or a status.
    RouteChanged { generation: u64 },

    /// A single editable field changed. Derived data stays valid.
    StopEdited { stop_id: u32 },

    /// Route emptied out (reset, or last stop deleted).
    RouteCleared,
}

pub struct RouteEventBus {
    events: VecDeque<RouteEvent>,
    max_pending: usize,
}

impl RouteEventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: RouteEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "route event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<RouteEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }
}

impl Default for RouteEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
