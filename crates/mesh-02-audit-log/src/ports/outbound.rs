//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the ledger service needs from its host: durable storage for
//! sealed entries and a clock.

use chrono::{DateTime, Utc};

use crate::domain::entry::ImmutableLogEntry;
use crate::domain::errors::StoreError;

/// Durable, append-only storage for sealed entries.
///
/// Production: `JsonLinesLedgerStore`
/// Testing: `InMemoryLedgerStore`
///
/// The service calls `append` only while holding its single writer lock, so
/// implementations need no internal synchronization. An `append` that
/// returns an error must leave no trace of the entry behind.
pub trait LedgerStore: Send + Sync + 'static {
    /// Durably store one entry after the current tail.
    fn append(&mut self, entry: &ImmutableLogEntry) -> Result<(), StoreError>;

    /// Every stored entry in append order.
    fn load_all(&self) -> Result<Vec<ImmutableLogEntry>, StoreError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
