//! # Configuration Errors
//!
//! Every validation error names the offending catalogue entry so that a
//! rejected startup or reload can be fixed without guesswork.

use std::path::PathBuf;

use shared_types::PatternError;
use thiserror::Error;

/// Errors raised while loading or validating a route catalogue.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Catalogue file could not be read.
    #[error("Failed to read route catalogue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension does not map to a supported format.
    #[error("Unsupported catalogue format for {path} (expected .yaml, .yml or .json)")]
    UnsupportedFormat { path: PathBuf },

    /// Catalogue text is syntactically invalid.
    #[error("Malformed route catalogue: {message}")]
    Parse { message: String },

    /// An event definition has an empty `event_type`.
    #[error("Event definition #{index} has an empty event_type")]
    EmptyEventType { index: usize },

    /// An event type is not a valid pattern.
    #[error("Event definition '{event_type}' has an invalid event_type: {source}")]
    InvalidPattern {
        event_type: String,
        #[source]
        source: PatternError,
    },

    /// `min_trust_score` lies outside `[0, 1]`.
    #[error("Event definition '{event_type}' has min_trust_score {value} outside [0, 1]")]
    TrustScoreOutOfRange { event_type: String, value: f64 },

    /// An event definition lists no publishers.
    #[error("Event definition '{event_type}' has no publishers")]
    NoPublishers { event_type: String },

    /// A publisher, subscriber or component id is empty.
    #[error("Empty component id in {context}")]
    EmptyComponentId { context: String },

    /// A subscriber references an undefined `@group`.
    #[error("Event definition '{event_type}' references unknown subscriber group '@{group}'")]
    UnknownGroup { event_type: String, group: String },

    /// A subscriber group has an empty name.
    #[error("Subscriber group with empty name")]
    EmptyGroupName,

    /// A subscriber group member does not resolve to a known component.
    #[error("Subscriber group '{group}' references undefined component '{member}'")]
    DanglingGroupMember { group: String, member: String },

    /// A routing-rules list names an event type no definition covers.
    #[error("routing_rules.{list} references undefined event type '{event_type}'")]
    UnknownEventType {
        list: &'static str,
        event_type: String,
    },
}

impl ConfigError {
    pub(crate) fn parse(err: impl std::fmt::Display) -> Self {
        ConfigError::Parse {
            message: err.to_string(),
        }
    }
}
