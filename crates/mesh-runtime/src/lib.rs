//! # Mesh Runtime Library
//!
//! Exposes the node's wiring for tests. The entry point is the `mesh-node`
//! binary in `main.rs`.
//!
//! ## Modules
//!
//! - `container/` - Environment configuration and component construction
//! - `handlers/` - Default component handlers
//! - `runtime` - Start, reload, maintenance and shutdown

pub mod container;
pub mod handlers;
pub mod runtime;

pub use container::{LedgerConfig, MeshConfig, MeshContainer, RuntimeConfigError};
pub use handlers::LoggingHandler;
pub use runtime::{MaintenanceReport, MeshRuntime};
