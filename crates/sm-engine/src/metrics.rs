//! # Engine Counters
//!
//! In-process atomic counters maintained by the coordinator. Cloning shares
//! the underlying counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Shared engine counters.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    pub updates_accepted: Arc<AtomicU64>,
    pub conflicts_retried: Arc<AtomicU64>,
    pub transitions_detected: Arc<AtomicU64>,
    pub notifications_dispatched: Arc<AtomicU64>,
    pub dispatch_failures: Arc<AtomicU64>,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub updates_accepted: u64,
    pub conflicts_retried: u64,
    pub transitions_detected: u64,
    pub notifications_dispatched: u64,
    pub dispatch_failures: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_accepted(&self, transitions: usize) {
        self.updates_accepted.fetch_add(1, Ordering::Relaxed);
        self.transitions_detected
            .fetch_add(transitions as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, ok: bool) {
        let counter = if ok {
            &self.notifications_dispatched
        } else {
            &self.dispatch_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_accepted: self.updates_accepted.load(Ordering::Relaxed),
            conflicts_retried: self.conflicts_retried.load(Ordering::Relaxed),
            transitions_detected: self.transitions_detected.load(Ordering::Relaxed),
            notifications_dispatched: self.notifications_dispatched.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = EngineMetrics::new();
        let clone = metrics.clone();
        clone.record_accepted(3);
        clone.record_conflict();
        clone.record_dispatch(true);
        clone.record_dispatch(false);

        let snap = metrics.snapshot();
        assert_eq!(snap.updates_accepted, 1);
        assert_eq!(snap.transitions_detected, 3);
        assert_eq!(snap.conflicts_retried, 1);
        assert_eq!(snap.notifications_dispatched, 1);
        assert_eq!(snap.dispatch_failures, 1);
    }
}
