//! # Inbound Ports (Driving Ports)
//!
//! The API the ledger exposes to the dispatcher and to operators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entry::{AuditRecord, ImmutableLogEntry, Sequence};
use crate::domain::errors::AuditError;
use crate::domain::heartbeat::SubsystemGap;
use crate::domain::integrity::IntegrityReport;
use crate::domain::query::AuditFilter;
use crate::service::AuditStats;

/// Primary API of the audit ledger.
///
/// Implementations must keep `sequence` strictly increasing and gap-free
/// and must never expose a partially appended entry.
#[async_trait]
pub trait AuditLogApi: Send + Sync {
    /// Seal and append a record, returning its sequence.
    ///
    /// ## Errors
    ///
    /// - `AppendFailed`: storage kept failing after bounded retries
    /// - `Serialization`: payload could not be encoded
    async fn append(&self, record: AuditRecord) -> Result<Sequence, AuditError>;

    /// Verify the chain up to the tail observed when the call starts.
    fn verify_integrity(&self) -> IntegrityReport;

    /// Entries matching `filter`, ascending by sequence, at most `limit`.
    fn get_entries(&self, filter: &AuditFilter, limit: usize) -> Vec<ImmutableLogEntry>;

    /// All entries sharing a correlation id, ascending by sequence.
    fn replay(&self, correlation_id: &str) -> Vec<ImmutableLogEntry>;

    /// Subsystems silent for longer than their heartbeat window.
    fn detect_gaps(&self, now: DateTime<Utc>) -> Vec<SubsystemGap>;

    /// Number of entries in the ledger.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> AuditStats;

    /// Most recent verification result, if any verification has run.
    fn last_integrity_report(&self) -> Option<IntegrityReport>;
}
