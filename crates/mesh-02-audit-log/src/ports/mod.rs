//! # Ports Layer
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (API exposed to the dispatcher)
//! - `outbound.rs` - Driven ports (storage and clock)

pub mod inbound;
pub mod outbound;
