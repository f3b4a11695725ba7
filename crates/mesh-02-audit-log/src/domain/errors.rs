//! # Domain Errors
//!
//! `StoreError` is what a persistence adapter reports; `AuditError` is what
//! the ledger reports to its callers after retries are exhausted.

use thiserror::Error;

/// Errors reported by a `LedgerStore` adapter or the writer lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The writer lock could not be acquired in time.
    #[error("Ledger writer busy")]
    Contention,

    /// Underlying I/O failed.
    #[error("Ledger I/O error: {message}")]
    Io { message: String, transient: bool },

    /// A failed write could not be rolled back; the file may end in a
    /// partial record and accepts no further appends.
    #[error("Ledger store poisoned: {0}")]
    Poisoned(String),

    /// A persisted record could not be decoded.
    #[error("Corrupt ledger record at line {line}: {message}")]
    Corrupt { line: usize, message: String },
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Contention => true,
            StoreError::Io { transient, .. } => *transient,
            StoreError::Poisoned(_) | StoreError::Corrupt { .. } => false,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let transient = matches!(
            err.kind(),
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
        );
        StoreError::Io {
            message: err.to_string(),
            transient,
        }
    }
}

/// Errors returned by the audit ledger.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Append gave up after bounded retries.
    #[error("Audit append abandoned after {attempts} attempt(s): {source}")]
    AppendFailed {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// The record payload could not be serialized.
    #[error("Failed to serialize audit payload: {0}")]
    Serialization(String),

    /// Existing entries could not be loaded.
    #[error("Failed to open audit ledger: {0}")]
    Open(#[source] StoreError),

    /// Heartbeat configuration string is malformed.
    #[error("Invalid heartbeat entry '{0}' (expected subsystem=seconds)")]
    InvalidHeartbeat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Contention.is_transient());
        assert!(!StoreError::Corrupt {
            line: 3,
            message: "eof".into()
        }
        .is_transient());

        let interrupted: StoreError =
            std::io::Error::new(std::io::ErrorKind::Interrupted, "signal").into();
        assert!(interrupted.is_transient());
        assert!(!StoreError::Poisoned("truncate failed".into()).is_transient());

        let denied: StoreError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "ro").into();
        assert!(!denied.is_transient());
    }

    #[test]
    fn test_append_failed_message() {
        let err = AuditError::AppendFailed {
            attempts: 3,
            source: StoreError::Contention,
        };
        assert_eq!(
            err.to_string(),
            "Audit append abandoned after 3 attempt(s): Ledger writer busy"
        );
    }
}
