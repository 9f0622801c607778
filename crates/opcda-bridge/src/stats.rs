// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by a session, its channels and its task queue.
#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Events accepted by a channel.
    events_published: AtomicU64,

    /// Events dropped because the channel was torn down.
    events_dropped: AtomicU64,

    /// Tasks handed to the task queue.
    tasks_submitted: AtomicU64,

    /// Tasks that resolved successfully.
    tasks_completed: AtomicU64,

    /// Tasks that resolved with an error.
    tasks_failed: AtomicU64,

    /// Provider callbacks that reached a live session.
    callbacks_routed: AtomicU64,

    /// Provider callbacks ignored (stale handle, torn down or link down).
    callbacks_ignored: AtomicU64,
}

impl BridgeStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one publish.
    pub fn record_publish(&self, accepted: bool) {
        if accepted {
            self.events_published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a task submission.
    pub fn record_task_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task resolution.
    pub fn record_task_finished(&self, success: bool) {
        if success {
            self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a routed callback.
    pub fn record_callback_routed(&self) {
        self.callbacks_routed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an ignored callback.
    pub fn record_callback_ignored(&self) {
        self.callbacks_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            callbacks_routed: self.callbacks_routed.load(Ordering::Relaxed),
            callbacks_ignored: self.callbacks_ignored.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Events accepted by a channel.
    pub events_published: u64,
    /// Events dropped at a torn-down channel.
    pub events_dropped: u64,
    /// Tasks submitted.
    pub tasks_submitted: u64,
    /// Tasks resolved successfully.
    pub tasks_completed: u64,
    /// Tasks resolved with an error.
    pub tasks_failed: u64,
    /// Callbacks routed to a live session.
    pub callbacks_routed: u64,
    /// Callbacks ignored.
    pub callbacks_ignored: u64,
}

impl StatsSnapshot {
    /// Returns the number of tasks still in flight.
    pub fn tasks_in_flight(&self) -> u64 {
        self.tasks_submitted
            .saturating_sub(self.tasks_completed + self.tasks_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = BridgeStats::new();
        stats.record_publish(true);
        stats.record_publish(false);
        stats.record_task_submitted();
        stats.record_task_submitted();
        stats.record_task_finished(false);
        stats.record_callback_ignored();

        let snap = stats.snapshot();
        assert_eq!(snap.events_published, 1);
        assert_eq!(snap.events_dropped, 1);
        assert_eq!(snap.tasks_failed, 1);
        assert_eq!(snap.tasks_in_flight(), 1);
        assert_eq!(snap.callbacks_ignored, 1);
    }
}
