//! # Shared Types Crate
//!
//! This crate contains the message entities, routing keys and event
//! patterns shared by every Governed Event Mesh crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-crate types are defined here.
//! - **Immutable Identity**: A `TriggerEvent`'s id is fixed at creation.
//! - **Typed Routing Keys**: `(source, event_type)` lookups go through `RouteKey`.

pub mod entities;
pub mod errors;
pub mod pattern;

pub use entities::*;
pub use errors::*;
pub use pattern::EventPattern;
