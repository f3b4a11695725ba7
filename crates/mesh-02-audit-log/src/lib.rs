//! # Immutable Audit Log (mesh-02)
//!
//! Append-only ledger whose entries are chained by SHA-256 hashes, making
//! retroactive edits detectable.
//!
//! ## Domain Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Hash chain | `entry[i].previous_hash == entry[i-1].entry_hash`; entry 0 links to `GENESIS_HASH` |
//! | Contiguity | Sequences are strictly increasing and gap-free |
//! | Atomic append | An entry is either sealed, persisted and published, or absent |
//! | Forward progress | A detected break never blocks further appends |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Entries, hash chain, verification, indexes, heartbeat policy
//! - `ports/` - `AuditLogApi` (inbound), `LedgerStore` and `TimeSource` (outbound)
//! - `adapters/` - In-memory and JSON-lines stores
//! - `service.rs` - `ImmutableAuditLog`
//!
//! ## Usage
//!
//! ```ignore
//! use mesh_02_audit_log::{AuditConfig, AuditRecord, ImmutableAuditLog};
//!
//! let log = ImmutableAuditLog::new_in_memory(AuditConfig::default());
//! let seq = log
//!     .append(AuditRecord::new("alice", "policy.update", "policy-7", "governance"))
//!     .await?;
//! assert!(log.verify_integrity().valid);
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryLedgerStore, JsonLinesLedgerStore};
pub use domain::entry::{AuditOutcome, AuditRecord, ImmutableLogEntry, Sequence};
pub use domain::errors::{AuditError, StoreError};
pub use domain::hash_chain::{compute_entry_hash, GENESIS_HASH};
pub use domain::heartbeat::{HeartbeatPolicy, SubsystemGap};
pub use domain::integrity::{verify_chain, ChainBreak, IntegrityReport};
pub use domain::query::AuditFilter;
pub use ports::inbound::AuditLogApi;
pub use ports::outbound::{LedgerStore, SystemTimeSource, TimeSource};
pub use service::{AuditConfig, AuditStats, ImmutableAuditLog};
