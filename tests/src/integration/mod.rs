//! # Integration Tests
//!
//! Cross-crate scenarios: a real routing table, a real ledger and a running
//! dispatcher, driven only through public APIs.

pub mod fixtures;

mod gate;
mod ledger;
mod priority;
mod reload;
