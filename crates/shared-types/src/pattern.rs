//! # Event Type Patterns
//!
//! Dotted event types can be matched with a small pattern grammar:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `*` | every event type |
//! | `governance.*` | `governance.<anything>` (one or more further segments) |
//! | `governance.policy_violation` | exactly that type |
//!
//! A `*` anywhere else is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PatternError;

/// A compiled event type pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventPattern {
    /// `*`
    Any,
    /// `prefix.*`, stored without the trailing `.*`.
    Prefix(String),
    /// A literal event type.
    Exact(String),
}

impl EventPattern {
    /// Parse a pattern, validating segment structure.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if raw == "*" {
            return Ok(Self::Any);
        }

        let (body, is_prefix) = match raw.strip_suffix(".*") {
            Some(body) => (body, true),
            None => (raw, false),
        };

        for segment in body.split('.') {
            if segment.is_empty() {
                return Err(PatternError::EmptySegment(raw.to_string()));
            }
            if segment.contains('*') {
                return Err(PatternError::MisplacedWildcard(raw.to_string()));
            }
        }

        if is_prefix {
            Ok(Self::Prefix(body.to_string()))
        } else {
            Ok(Self::Exact(body.to_string()))
        }
    }

    /// Whether this pattern contains a wildcard.
    pub fn is_wildcard(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    /// Check an event type against the pattern.
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(literal) => literal == event_type,
            Self::Prefix(prefix) => event_type
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|rest| !rest.is_empty()),
        }
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix(prefix) => write!(f, "{prefix}.*"),
            Self::Exact(literal) => f.write_str(literal),
        }
    }
}

impl FromStr for EventPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EventPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EventPattern> for String {
    fn from(value: EventPattern) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_matches_everything() {
        let p = EventPattern::parse("*").unwrap();
        assert!(p.matches("governance.policy_violation"));
        assert!(p.matches("x"));
    }

    #[test]
    fn test_prefix_requires_further_segment() {
        let p = EventPattern::parse("governance.*").unwrap();
        assert!(p.matches("governance.policy_violation"));
        assert!(p.matches("governance.a.b"));
        assert!(!p.matches("governance"));
        assert!(!p.matches("governanceX.a"));
        assert!(!p.matches("knowledge.ingested"));
    }

    #[test]
    fn test_exact_pattern() {
        let p = EventPattern::parse("chat.message").unwrap();
        assert!(!p.is_wildcard());
        assert!(p.matches("chat.message"));
        assert!(!p.matches("chat.message.edited"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert_eq!(EventPattern::parse(""), Err(PatternError::Empty));
        assert!(matches!(
            EventPattern::parse("gov*.x"),
            Err(PatternError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            EventPattern::parse("*.violation"),
            Err(PatternError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            EventPattern::parse("governance..x"),
            Err(PatternError::EmptySegment(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        for raw in ["*", "governance.*", "a.b.c"] {
            assert_eq!(EventPattern::parse(raw).unwrap().to_string(), raw);
        }
    }
}
