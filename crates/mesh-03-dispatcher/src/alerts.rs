//! # Alert Hook
//!
//! Optional slot for a host-provided alert sink. Hooks run synchronously on
//! the dispatch path and must return quickly; a panicking hook is logged
//! and otherwise ignored.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use mesh_telemetry::log_mesh_event;
use parking_lot::RwLock;
use serde::Serialize;
use shared_types::{ComponentId, EventId};

use crate::report::BlockReason;

/// Something an operator should know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// The validation gate blocked an event whose rule sets `alert_on_failure`.
    Blocked {
        event_id: EventId,
        event_type: String,
        source: ComponentId,
        reason: BlockReason,
    },
    /// One or more targets failed for an event whose rule sets `alert_on_failure`.
    DeliveryFailure {
        event_id: EventId,
        event_type: String,
        failed_targets: Vec<ComponentId>,
    },
    /// An audit append was abandoned.
    AuditWriteFailure { event_id: EventId, error: String },
    /// Verification found a broken hash chain.
    IntegrityViolation {
        broken_at: Option<u64>,
        entries_verified: u64,
    },
}

/// Receiver for alerts.
pub trait AlertHook: Send + Sync {
    fn raise(&self, alert: &Alert);
}

impl<F> AlertHook for F
where
    F: Fn(&Alert) + Send + Sync,
{
    fn raise(&self, alert: &Alert) {
        self(alert)
    }
}

#[derive(Default)]
pub(crate) struct AlertSlot {
    hook: RwLock<Option<Arc<dyn AlertHook>>>,
}

impl AlertSlot {
    pub fn set(&self, hook: Option<Arc<dyn AlertHook>>) {
        *self.hook.write() = hook;
    }

    pub fn raise(&self, alert: Alert) {
        let Some(hook) = self.hook.read().clone() else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| hook.raise(&alert))).is_err() {
            log_mesh_event!(error, "dispatcher", "Alert hook panicked", alert = ?alert);
        }
    }
}
