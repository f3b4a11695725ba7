//! # Delivery Reports
//!
//! Every submitted event ends in exactly one `DeliveryReport`. Blocking,
//! lane rejection and handler failures are all values here, never errors.

use std::fmt;

use serde::Serialize;
use shared_types::{ComponentId, EventId, TriggerEvent};

/// Scheduling lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Priority,
    Normal,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Priority => "priority",
            Lane::Normal => "normal",
        }
    }
}

/// Which validator a timeout or warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    Constitutional,
    TrustScore,
}

/// Why the validation gate blocked an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    ConstitutionalRejected,
    TrustScoreTooLow { score: f64, threshold: f64 },
    ValidationTimeout { check: ValidationCheck },
}

impl BlockReason {
    /// Stable label used in metrics, logs and audit results.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::ConstitutionalRejected => "constitutional_rejected",
            BlockReason::TrustScoreTooLow { .. } => "trust_score_too_low",
            BlockReason::ValidationTimeout { .. } => "validation_timeout",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an approved event was not scheduled or not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    LaneFull,
    ShuttingDown,
    Cancelled,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::LaneFull => "lane_full",
            RejectReason::ShuttingDown => "shutting_down",
            RejectReason::Cancelled => "cancelled",
        }
    }
}

/// Final outcome of one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Every target handled the event.
    Delivered,
    /// At least one target failed; the others were still attempted.
    PartialFailure,
    Blocked(BlockReason),
    /// No rule or subscription matched.
    Unrouted,
    Rejected { reason: RejectReason },
}

impl DeliveryStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, DeliveryStatus::Blocked(_))
    }
}

/// Outcome for a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum TargetOutcome {
    Delivered,
    Failed(String),
    Panicked(String),
    TimedOut,
    /// No handler is registered for the target component.
    NoHandler,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TargetOutcome::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOutcome::Delivered => "delivered",
            TargetOutcome::Failed(_) => "failed",
            TargetOutcome::Panicked(_) => "panicked",
            TargetOutcome::TimedOut => "timed_out",
            TargetOutcome::NoHandler => "no_handler",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: ComponentId,
    pub outcome: TargetOutcome,
    pub duration_ms: u64,
}

/// The result of `emit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub event_id: EventId,
    pub event_type: String,
    pub source: ComponentId,
    pub status: DeliveryStatus,
    pub targets: Vec<TargetReport>,
    pub lane: Option<Lane>,
    /// Sequence of the audit entry written for this event, if any.
    pub audit_sequence: Option<u64>,
    /// Routing map version the event was resolved against.
    pub map_version: u64,
}

impl DeliveryReport {
    pub(crate) fn settled(event: &TriggerEvent, status: DeliveryStatus, map_version: u64) -> Self {
        Self {
            event_id: event.id(),
            event_type: event.event_type.clone(),
            source: event.source.clone(),
            status,
            targets: Vec::new(),
            lane: None,
            audit_sequence: None,
            map_version,
        }
    }

    /// Targets whose handler did not succeed.
    pub fn failed_targets(&self) -> Vec<ComponentId> {
        self.targets
            .iter()
            .filter(|t| !t.outcome.is_success())
            .map(|t| t.target.clone())
            .collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_success()).count()
    }
}
