//! # Governed Event Mesh Test Suite
//!
//! Unified test crate exercising the mesh crates together.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # End-to-end scenarios across crates
//! │   ├── fixtures.rs    # Catalogue files, recording handlers
//! │   ├── ledger.rs      # Hash chain, concurrency, tampering
//! │   ├── gate.rs        # Validation gate outcomes and audit side effects
//! │   ├── priority.rs    # Strict lane ordering under load
//! │   └── reload.rs      # All-or-nothing catalogue reloads
//! └── benches/           # criterion benchmarks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mesh-tests
//!
//! # Benchmarks
//! cargo bench -p mesh-tests
//! ```

pub mod integration;
