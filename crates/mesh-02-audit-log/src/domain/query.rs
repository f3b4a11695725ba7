//! Query filters for `get_entries`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::ImmutableLogEntry;

/// Conjunctive filter over ledger entries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub subsystem: Option<String>,
    pub correlation_id: Option<String>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    #[must_use]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn matches(&self, entry: &ImmutableLogEntry) -> bool {
        fn field_ok(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }

        field_ok(&self.actor, &entry.actor)
            && field_ok(&self.action, &entry.action)
            && field_ok(&self.resource, &entry.resource)
            && field_ok(&self.subsystem, &entry.subsystem)
            && self
                .correlation_id
                .as_deref()
                .map_or(true, |c| entry.correlation_id.as_deref() == Some(c))
            && self.since.map_or(true, |s| entry.timestamp >= s)
            && self.until.map_or(true, |u| entry.timestamp < u)
    }
}
