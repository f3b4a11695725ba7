//! # Domain Layer
//!
//! Pure ledger logic with no I/O.
//!
//! ## Modules
//!
//! - `entry` - Sealed entries and the unsealed `AuditRecord`
//! - `hash_chain` - Entry hash formula and genesis constant
//! - `integrity` - Chain verification over a snapshot
//! - `query` - Conjunctive entry filters
//! - `index` - Secondary indexes and filter execution
//! - `heartbeat` - Subsystem liveness gap detection
//! - `errors` - Domain error types

pub mod entry;
pub mod errors;
pub mod hash_chain;
pub mod heartbeat;
pub mod index;
pub mod integrity;
pub mod query;
