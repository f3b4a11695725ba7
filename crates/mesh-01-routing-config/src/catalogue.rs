//! # Route Catalogue
//!
//! Typed form of the declarative catalogue file plus its referential
//! integrity checks. A catalogue that passes [`RouteCatalogue::validate`] can
//! always be compiled into a `RoutingMap`.
//!
//! ```yaml
//! components: [audit_sink]
//! events:
//!   - event_type: governance.policy_violation
//!     description: A policy was violated
//!     publishers: [governance_engine]
//!     subscribers: [alert_system, "@watchers"]
//!     requires_constitutional_validation: false
//!     min_trust_score: 0.9
//! routing_rules:
//!   priority_events: [governance.policy_violation]
//!   audit_events: [governance.policy_violation]
//!   alert_events: []
//! subscriber_groups:
//!   watchers: [immutable_log]
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use shared_types::EventPattern;

use crate::errors::ConfigError;

/// Publisher entry meaning "any source".
pub const ANY_PUBLISHER: &str = "*";

/// Prefix marking a subscriber entry as a group reference.
pub const GROUP_PREFIX: char = '@';

/// Root of a route catalogue file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteCatalogue {
    /// Components that appear in no event definition.
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub routing_rules: RoutingRulesSection,
    #[serde(default)]
    pub subscriber_groups: BTreeMap<String, Vec<String>>,
}

/// One event definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventDefinition {
    pub event_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub publishers: Vec<String>,
    #[serde(default)]
    pub subscribers: Vec<String>,
    #[serde(default)]
    pub requires_constitutional_validation: bool,
    #[serde(default)]
    pub min_trust_score: Option<f64>,
    #[serde(default)]
    pub priority_level: u32,
    #[serde(default)]
    pub audit_required: bool,
    #[serde(default)]
    pub alert_on_failure: bool,
}

/// Event-type lists that apply policy across definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingRulesSection {
    #[serde(default)]
    pub priority_events: Vec<String>,
    #[serde(default)]
    pub audit_events: Vec<String>,
    #[serde(default)]
    pub alert_events: Vec<String>,
}

impl EventDefinition {
    /// Group names referenced by this definition's subscribers.
    pub fn group_refs(&self) -> impl Iterator<Item = &str> {
        self.subscribers
            .iter()
            .filter_map(|s| s.strip_prefix(GROUP_PREFIX))
    }
}

impl RouteCatalogue {
    /// Every component id the catalogue mentions directly.
    ///
    /// This is the declared `components` list, every named publisher and
    /// every subscriber that is not a group reference.
    pub fn known_components(&self) -> BTreeSet<String> {
        let mut known: BTreeSet<String> = self.components.iter().cloned().collect();
        for def in &self.events {
            known.extend(
                def.publishers
                    .iter()
                    .filter(|p| p.as_str() != ANY_PUBLISHER)
                    .cloned(),
            );
            known.extend(
                def.subscribers
                    .iter()
                    .filter(|s| !s.starts_with(GROUP_PREFIX))
                    .cloned(),
            );
        }
        known
    }

    /// Check referential integrity. The first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, def) in self.events.iter().enumerate() {
            validate_definition(index, def, &self.subscriber_groups)?;
        }

        for component in &self.components {
            if component.trim().is_empty() {
                return Err(ConfigError::EmptyComponentId {
                    context: "components".to_string(),
                });
            }
        }

        let known = self.known_components();
        for (group, members) in &self.subscriber_groups {
            if group.trim().is_empty() {
                return Err(ConfigError::EmptyGroupName);
            }
            for member in members {
                if !known.contains(member) {
                    return Err(ConfigError::DanglingGroupMember {
                        group: group.clone(),
                        member: member.clone(),
                    });
                }
            }
        }

        let defined: BTreeSet<&str> = self.events.iter().map(|d| d.event_type.as_str()).collect();
        // Definitions were parsed above, so every pattern here is valid.
        let patterns: Vec<EventPattern> = self
            .events
            .iter()
            .filter_map(|d| EventPattern::parse(&d.event_type).ok())
            .collect();
        let covered = |entry: &str| {
            defined.contains(entry) || patterns.iter().any(|p| p.matches(entry))
        };
        let lists = [
            ("priority_events", &self.routing_rules.priority_events),
            ("audit_events", &self.routing_rules.audit_events),
            ("alert_events", &self.routing_rules.alert_events),
        ];
        for (list, entries) in lists {
            if let Some(missing) = entries.iter().find(|e| !covered(e.as_str())) {
                return Err(ConfigError::UnknownEventType {
                    list,
                    event_type: missing.clone(),
                });
            }
        }

        Ok(())
    }
}

fn validate_definition(
    index: usize,
    def: &EventDefinition,
    groups: &BTreeMap<String, Vec<String>>,
) -> Result<(), ConfigError> {
    if def.event_type.trim().is_empty() {
        return Err(ConfigError::EmptyEventType { index });
    }
    EventPattern::parse(&def.event_type).map_err(|source| ConfigError::InvalidPattern {
        event_type: def.event_type.clone(),
        source,
    })?;

    if let Some(value) = def.min_trust_score {
        // NaN fails both comparisons
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::TrustScoreOutOfRange {
                event_type: def.event_type.clone(),
                value,
            });
        }
    }

    if def.publishers.is_empty() {
        return Err(ConfigError::NoPublishers {
            event_type: def.event_type.clone(),
        });
    }
    if def.publishers.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::EmptyComponentId {
            context: format!("publishers of '{}'", def.event_type),
        });
    }
    if def
        .subscribers
        .iter()
        .any(|s| s.trim_start_matches(GROUP_PREFIX).trim().is_empty())
    {
        return Err(ConfigError::EmptyComponentId {
            context: format!("subscribers of '{}'", def.event_type),
        });
    }

    if let Some(group) = def.group_refs().find(|g| !groups.contains_key(*g)) {
        return Err(ConfigError::UnknownGroup {
            event_type: def.event_type.clone(),
            group: group.to_string(),
        });
    }

    Ok(())
}
