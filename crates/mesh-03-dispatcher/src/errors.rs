//! # Dispatcher Errors
//!
//! Only lifecycle misuse and configuration problems are errors. Policy
//! outcomes (blocked, unrouted, handler failures) are reported in a
//! `DeliveryReport`.

use mesh_01_routing_config::ConfigError;
use shared_types::PatternError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// `start` was called on a dispatcher that already left `Created`.
    #[error("Dispatcher already started")]
    AlreadyStarted,

    /// `start` was called after `stop`.
    #[error("Dispatcher has been stopped")]
    Stopped,

    /// `start` was called before any route catalogue was loaded.
    #[error("No route catalogue loaded")]
    ConfigNotLoaded,

    /// `start` was called outside a Tokio runtime.
    #[error("Dispatcher must be started inside a Tokio runtime")]
    NoRuntime,

    /// A subscription pattern could not be parsed.
    #[error("Invalid subscription pattern: {0}")]
    Pattern(#[from] PatternError),

    /// Loading or reloading the route catalogue failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
