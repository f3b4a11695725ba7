//! # Component Handlers
//!
//! Default handlers the node binds to catalogue components.

pub mod logging;

pub use logging::LoggingHandler;
