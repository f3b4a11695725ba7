//! Running dispatcher counters.
//!
//! Scalars are atomics; per-reason and per-target breakdowns sit behind a
//! short-lived mutex. Readers get a consistent-enough snapshot without ever
//! blocking a worker for longer than one map update.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use shared_types::ComponentId;

use crate::report::BlockReason;

#[derive(Default)]
pub(crate) struct DispatchStats {
    emitted: AtomicU64,
    routed: AtomicU64,
    blocked: AtomicU64,
    validated: AtomicU64,
    unrouted: AtomicU64,
    rejected: AtomicU64,
    partial_failure: AtomicU64,
    audit_write_failures: AtomicU64,
    blocked_by_reason: Mutex<BTreeMap<String, u64>>,
    target_failures: Mutex<BTreeMap<ComponentId, u64>>,
}

impl DispatchStats {
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validated(&self) {
        self.validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_partial_failure(&self) {
        self.partial_failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_failure(&self) {
        self.audit_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self, reason: &BlockReason) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        *self
            .blocked_by_reason
            .lock()
            .entry(reason.as_str().to_string())
            .or_default() += 1;
    }

    pub fn record_target_failure(&self, target: &ComponentId) {
        *self.target_failures.lock().entry(target.clone()).or_default() += 1;
    }

    pub fn snapshot(&self, lanes: (usize, usize), routing_map_version: u64) -> StatsSnapshot {
        StatsSnapshot {
            events_emitted: self.emitted.load(Ordering::Relaxed),
            events_routed: self.routed.load(Ordering::Relaxed),
            events_blocked: self.blocked.load(Ordering::Relaxed),
            events_validated: self.validated.load(Ordering::Relaxed),
            events_unrouted: self.unrouted.load(Ordering::Relaxed),
            events_rejected: self.rejected.load(Ordering::Relaxed),
            events_partial_failure: self.partial_failure.load(Ordering::Relaxed),
            blocked_by_reason: self.blocked_by_reason.lock().clone(),
            events_per_target_failure: self
                .target_failures
                .lock()
                .iter()
                .map(|(target, count)| (target.to_string(), *count))
                .collect(),
            audit_write_failures: self.audit_write_failures.load(Ordering::Relaxed),
            lane_depth_priority: lanes.0,
            lane_depth_normal: lanes.1,
            routing_map_version,
        }
    }
}

/// Point-in-time view returned by `get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_emitted: u64,
    pub events_routed: u64,
    pub events_blocked: u64,
    pub events_validated: u64,
    pub events_unrouted: u64,
    pub events_rejected: u64,
    pub events_partial_failure: u64,
    pub blocked_by_reason: BTreeMap<String, u64>,
    pub events_per_target_failure: BTreeMap<String, u64>,
    pub audit_write_failures: u64,
    pub lane_depth_priority: usize,
    pub lane_depth_normal: usize,
    pub routing_map_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_breakdown() {
        let stats = DispatchStats::default();
        stats.record_blocked(&BlockReason::ConstitutionalRejected);
        stats.record_blocked(&BlockReason::ConstitutionalRejected);
        stats.record_blocked(&BlockReason::TrustScoreTooLow {
            score: 0.1,
            threshold: 0.5,
        });

        let snapshot = stats.snapshot((0, 0), 1);
        assert_eq!(snapshot.events_blocked, 3);
        assert_eq!(snapshot.blocked_by_reason["constitutional_rejected"], 2);
        assert_eq!(snapshot.blocked_by_reason["trust_score_too_low"], 1);
    }

    #[test]
    fn test_target_failures_keyed_by_id() {
        let stats = DispatchStats::default();
        stats.record_target_failure(&ComponentId::from("alert_system"));
        stats.record_target_failure(&ComponentId::from("alert_system"));

        let snapshot = stats.snapshot((2, 5), 3);
        assert_eq!(snapshot.events_per_target_failure["alert_system"], 2);
        assert_eq!(snapshot.lane_depth_priority, 2);
        assert_eq!(snapshot.lane_depth_normal, 5);
        assert_eq!(snapshot.routing_map_version, 3);
    }

    #[test]
    fn test_snapshot_serializes_counter_names() {
        let stats = DispatchStats::default();
        stats.record_emitted();
        stats.record_routed();
        let json = serde_json::to_value(stats.snapshot((0, 0), 0)).unwrap();
        assert_eq!(json["events_emitted"], 1);
        assert_eq!(json["events_routed"], 1);
        assert_eq!(json["events_blocked"], 0);
    }
}
