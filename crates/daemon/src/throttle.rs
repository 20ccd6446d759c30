// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker refresh throttle.
//!
//! Scheduled ticks and the manual refresh endpoint share one path through
//! the mediator; this throttle is what keeps them from hammering the same
//! worker. One slot per `(worker, kind)` pair.

use labfleet_core::{Clock, WorkerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Debounces refreshes of the same kind against one worker.
pub struct RefreshThrottle<C: Clock> {
    clock: C,
    min_interval: Duration,
    last: Mutex<HashMap<(WorkerId, &'static str), Instant>>,
}

impl<C: Clock> RefreshThrottle<C> {
    pub fn new(clock: C, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Claim a refresh slot. Returns false when the previous refresh of
    /// this kind is still within the minimum interval.
    pub fn try_acquire(&self, worker: WorkerId, kind: &'static str) -> bool {
        let now = self.clock.now();
        let mut last = self.last.lock();
        if let Some(prev) = last.get(&(worker, kind)) {
            if now.duration_since(*prev) < self.min_interval {
                return false;
            }
        }
        last.insert((worker, kind), now);
        true
    }

    /// Drop all slots for a worker (used after terminate).
    pub fn forget(&self, worker: WorkerId) {
        self.last.lock().retain(|(id, _), _| *id != worker);
    }
}

#[cfg(test)]
#[path = "throttle_tests.rs"]
mod tests;
