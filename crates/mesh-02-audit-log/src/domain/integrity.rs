//! # Integrity Verification
//!
//! Walks a ledger snapshot in sequence order and reports the first entry
//! where the chain no longer holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{ImmutableLogEntry, Sequence};
use super::hash_chain::GENESIS_HASH;

/// Why verification stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainBreak {
    /// Sequence is not the predecessor's plus one.
    SequenceGap { expected: Sequence },
    /// `previous_hash` differs from the predecessor's `entry_hash`.
    PreviousHashMismatch,
    /// Stored fields no longer hash to `entry_hash`.
    EntryHashMismatch,
}

/// Result of one verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    /// Entries that verified before the first break (all of them when valid).
    pub entries_verified: u64,
    pub broken_at: Option<Sequence>,
    pub break_kind: Option<ChainBreak>,
    pub checked_at: DateTime<Utc>,
}

impl IntegrityReport {
    fn intact(entries_verified: u64) -> Self {
        Self {
            valid: true,
            entries_verified,
            broken_at: None,
            break_kind: None,
            checked_at: Utc::now(),
        }
    }

    fn broken(entries_verified: u64, at: Sequence, kind: ChainBreak) -> Self {
        Self {
            valid: false,
            entries_verified,
            broken_at: Some(at),
            break_kind: Some(kind),
            checked_at: Utc::now(),
        }
    }
}

/// Verify a ledger snapshot ordered by sequence, starting at sequence 0.
pub fn verify_chain<'a>(entries: impl IntoIterator<Item = &'a ImmutableLogEntry>) -> IntegrityReport {
    let mut expected_sequence: Sequence = 0;
    let mut expected_previous = GENESIS_HASH;
    let mut verified = 0u64;

    for entry in entries {
        if entry.sequence != expected_sequence {
            return IntegrityReport::broken(
                verified,
                entry.sequence,
                ChainBreak::SequenceGap {
                    expected: expected_sequence,
                },
            );
        }
        if entry.previous_hash != expected_previous {
            return IntegrityReport::broken(
                verified,
                entry.sequence,
                ChainBreak::PreviousHashMismatch,
            );
        }
        if entry.recompute_hash() != entry.entry_hash {
            return IntegrityReport::broken(verified, entry.sequence, ChainBreak::EntryHashMismatch);
        }

        verified += 1;
        expected_sequence += 1;
        expected_previous = entry.entry_hash.as_str();
    }

    IntegrityReport::intact(verified)
}
