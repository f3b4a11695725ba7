//! # Routing Configuration (mesh-01)
//!
//! Parses the declarative route catalogue into an immutable [`RoutingMap`]
//! and publishes it through a [`RoutingTable`] that swaps maps atomically.
//!
//! ## Pipeline
//!
//! ```text
//! routes.yaml ──parse──→ RouteCatalogue ──validate──→ compile ──→ RoutingMap
//!                                                                  │
//!                                    RoutingTable::install ←───────┘
//! ```
//!
//! ## Guarantees
//!
//! - A map is never mutated after compilation.
//! - `reload` is all-or-nothing: any `ConfigError` leaves the active map in place.
//! - Readers holding a snapshot keep resolving against it after a swap.

pub mod catalogue;
pub mod errors;
pub mod loader;
pub mod map;
pub mod rule;
pub mod table;

pub use catalogue::{EventDefinition, RouteCatalogue, RoutingRulesSection};
pub use errors::ConfigError;
pub use loader::{load, load_str, parse_catalogue, CatalogueFormat};
pub use map::RoutingMap;
pub use rule::{PatternRule, ResolvedRoute, RoutingRule, SourceMatcher};
pub use table::RoutingTable;
