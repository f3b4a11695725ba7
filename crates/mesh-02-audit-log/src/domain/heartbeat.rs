//! # Heartbeat Gap Detection
//!
//! A subsystem with an expected heartbeat interval is flagged when the
//! ledger holds no entry for it within `multiplier × interval`. Subsystems
//! never seen since the ledger opened are measured from the open time.
//!
//! This is a liveness check only; it has no bearing on chain integrity.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::AuditError;

/// Expected heartbeat intervals per subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    intervals: BTreeMap<String, Duration>,
    multiplier: u32,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MULTIPLIER)
    }
}

impl HeartbeatPolicy {
    pub const DEFAULT_MULTIPLIER: u32 = 3;

    pub fn new(multiplier: u32) -> Self {
        Self {
            intervals: BTreeMap::new(),
            multiplier: multiplier.max(1),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, subsystem: impl Into<String>, interval: Duration) -> Self {
        self.intervals.insert(subsystem.into(), interval);
        self
    }

    /// Parse `subsystem=seconds,subsystem=seconds`.
    pub fn parse(spec: &str, multiplier: u32) -> Result<Self, AuditError> {
        let mut policy = Self::new(multiplier);
        for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let invalid = || AuditError::InvalidHeartbeat(item.to_string());
            let (name, secs) = item.split_once('=').ok_or_else(invalid)?;
            let name = name.trim();
            let secs: u64 = secs.trim().parse().map_err(|_| invalid())?;
            if name.is_empty() || secs == 0 {
                return Err(invalid());
            }
            policy
                .intervals
                .insert(name.to_string(), Duration::from_secs(secs));
        }
        Ok(policy)
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn intervals(&self) -> &BTreeMap<String, Duration> {
        &self.intervals
    }

    /// Subsystems that have been silent for longer than their window.
    pub fn detect(
        &self,
        last_seen: &HashMap<String, DateTime<Utc>>,
        opened_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Vec<SubsystemGap> {
        self.intervals
            .iter()
            .filter_map(|(subsystem, interval)| {
                // A window too large to represent is never exceeded
                let window = interval.checked_mul(self.multiplier)?;
                let seen = last_seen.get(subsystem).copied();
                let silent_for = (now - seen.unwrap_or(opened_at))
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                (silent_for > window).then(|| SubsystemGap {
                    subsystem: subsystem.clone(),
                    expected_interval: *interval,
                    last_seen: seen,
                    silent_for,
                })
            })
            .collect()
    }
}

/// A subsystem that stopped reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubsystemGap {
    pub subsystem: String,
    pub expected_interval: Duration,
    pub last_seen: Option<DateTime<Utc>>,
    pub silent_for: Duration,
}
