//! # Adapters Module
//!
//! `LedgerStore` implementations.
//!
//! - `memory`: process-lifetime store for tests and ephemeral nodes
//! - `file`: JSON-lines file with optional fsync per append

pub mod file;
pub mod memory;

pub use file::JsonLinesLedgerStore;
pub use memory::InMemoryLedgerStore;
