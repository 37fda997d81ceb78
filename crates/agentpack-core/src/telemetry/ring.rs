//! Bounded FIFO event ring
//!
//! A single `parking_lot::Mutex` guards append, eviction and counter updates
//! as one step, so ordinals are contiguous and match lock-acquisition order
//! no matter how many threads emit at once.

use super::events::{EventName, EventPayload, TelemetryEvent};
use super::TelemetrySink;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ring capacity
pub const DEFAULT_CAPACITY: usize = 256;

/// Counters describing a ring at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryStats {
    /// Maximum number of retained events
    pub capacity: usize,
    /// Events currently retained
    pub len: usize,
    /// Events emitted since creation or reset
    pub emitted: u64,
    /// Events dropped to make room
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct RingState {
    events: VecDeque<TelemetryEvent>,
    emitted: u64,
    evicted: u64,
}

/// Thread-safe bounded event log
#[derive(Debug)]
pub struct TelemetryRing {
    capacity: usize,
    state: Mutex<RingState>,
}

impl TelemetryRing {
    /// Ring with the default capacity of 256
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Ring with an explicit capacity (at least one slot)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(RingState {
                events: VecDeque::with_capacity(capacity),
                ..RingState::default()
            }),
        }
    }

    /// Record an event, evicting the oldest one when full
    ///
    /// Returns the ordinal assigned to the new event.
    pub fn emit(&self, name: EventName, payload: EventPayload) -> u64 {
        let mut state = self.state.lock();
        if state.events.len() >= self.capacity {
            state.events.pop_front();
            state.evicted += 1;
        }
        let ordinal = state.emitted;
        state.events.push_back(TelemetryEvent {
            name,
            payload,
            ordinal,
        });
        state.emitted += 1;
        ordinal
    }

    /// Independent copy of the buffered events, oldest first
    pub fn snapshot(&self) -> Vec<TelemetryEvent> {
        self.state.lock().events.iter().cloned().collect()
    }

    /// Clear events and counters
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.events.clear();
        state.emitted = 0;
        state.evicted = 0;
    }

    /// Consistent view of every counter
    pub fn stats(&self) -> TelemetryStats {
        let state = self.state.lock();
        TelemetryStats {
            capacity: self.capacity,
            len: state.events.len(),
            emitted: state.emitted,
            evicted: state.evicted,
        }
    }

    /// Maximum number of retained events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently retained
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// True when nothing is retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events emitted since creation or reset
    pub fn emitted(&self) -> u64 {
        self.state.lock().emitted
    }

    /// Events dropped to make room
    pub fn evicted(&self) -> u64 {
        self.state.lock().evicted
    }
}

impl Default for TelemetryRing {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for TelemetryRing {
    fn emit(&self, name: EventName, payload: EventPayload) {
        TelemetryRing::emit(self, name, payload);
    }
}
