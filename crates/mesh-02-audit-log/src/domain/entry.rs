//! # Ledger Entries
//!
//! `ImmutableLogEntry` is the sealed, persisted record. `AuditRecord` is what
//! callers hand to `append`; the ledger assigns the sequence, timestamp and
//! hashes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::hash_chain::compute_entry_hash;

/// Position of an entry in the ledger. Starts at 0.
pub type Sequence = u64;

/// One sealed ledger record.
///
/// Entries are never updated or deleted after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableLogEntry {
    pub sequence: Sequence,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub subsystem: String,
    /// Serialized JSON snapshot.
    pub payload: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub entry_hash: String,
    pub previous_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl ImmutableLogEntry {
    /// Build an entry and compute its hash.
    pub(crate) fn seal(
        sequence: Sequence,
        record: &AuditRecord,
        payload: String,
        previous_hash: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let entry_hash = compute_entry_hash(
            sequence,
            &record.actor,
            &record.action,
            &record.resource,
            &payload,
            &record.result,
            &previous_hash,
        );
        Self {
            sequence,
            actor: record.actor.clone(),
            action: record.action.clone(),
            resource: record.resource.clone(),
            subsystem: record.subsystem.clone(),
            payload,
            result: record.result.clone(),
            correlation_id: record.correlation_id.clone(),
            entry_hash,
            previous_hash,
            timestamp,
        }
    }

    /// Hash of the stored fields, ignoring the stored `entry_hash`.
    pub fn recompute_hash(&self) -> String {
        compute_entry_hash(
            self.sequence,
            &self.actor,
            &self.action,
            &self.resource,
            &self.payload,
            &self.result,
            &self.previous_hash,
        )
    }

    /// Payload parsed back into JSON.
    pub fn payload_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// Outcome strings used by the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failed,
    Blocked,
    PartialFailure,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failed => "failed",
            AuditOutcome::Blocked => "blocked",
            AuditOutcome::PartialFailure => "partial_failure",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unsealed input to `append`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub subsystem: String,
    pub payload: Value,
    pub result: String,
    pub correlation_id: Option<String>,
}

impl AuditRecord {
    /// A `success` record with a null payload.
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        subsystem: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            subsystem: subsystem.into(),
            payload: Value::Null,
            result: AuditOutcome::Success.as_str().to_string(),
            correlation_id: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Free-form result string.
    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    #[must_use]
    pub fn with_outcome(self, outcome: AuditOutcome) -> Self {
        self.with_result(outcome.as_str())
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}
