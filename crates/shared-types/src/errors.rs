//! # Error Types
//!
//! Defines error types shared across mesh crates.

use thiserror::Error;

/// Errors produced while parsing an event type pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// Pattern string was empty or whitespace.
    #[error("Event pattern is empty")]
    Empty,

    /// A dotted segment was empty (e.g. `a..b`).
    #[error("Event pattern '{0}' contains an empty segment")]
    EmptySegment(String),

    /// `*` used anywhere other than alone or as a trailing `.*`.
    #[error("Event pattern '{0}' uses '*' outside a trailing '.*' segment")]
    MisplacedWildcard(String),
}

/// Failure reported by a component handler.
///
/// Handlers return this instead of panicking; the dispatcher records the
/// message against the failing target only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Human-readable failure description.
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
