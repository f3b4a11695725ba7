//! # Hash Chain
//!
//! `entry_hash = SHA-256(sequence ∥ actor ∥ action ∥ resource ∥ payload ∥ result ∥ previous_hash)`
//!
//! The sequence is encoded as 8 big-endian bytes. Every string field is
//! prefixed with its byte length (8 bytes, big-endian) so that field
//! boundaries cannot be shifted without changing the digest.

use sha2::{Digest, Sha256};

/// `previous_hash` of the entry with sequence 0.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the hex-encoded hash of one entry.
pub fn compute_entry_hash(
    sequence: u64,
    actor: &str,
    action: &str,
    resource: &str,
    payload: &str,
    result: &str,
    previous_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_be_bytes());
    for field in [actor, action, resource, payload, result, previous_hash] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
