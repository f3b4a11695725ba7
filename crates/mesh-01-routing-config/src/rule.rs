//! # Routing Rules
//!
//! A `RoutingRule` is the compiled policy for one `(source, event_type)` pair
//! or for a wildcard pattern. Rules are immutable once compiled into a
//! `RoutingMap`.

use serde::{Deserialize, Serialize};
use shared_types::{ComponentId, EventPattern};

/// Declarative delivery policy for one catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Stable identifier `event_type@publisher#definition_index`, used to
    /// deduplicate fail-open warnings.
    pub rule_id: String,
    /// Ordered, de-duplicated delivery targets.
    pub targets: Vec<ComponentId>,
    pub requires_constitutional_validation: bool,
    pub min_trust_score: Option<f64>,
    pub priority_level: u32,
    pub audit_required: bool,
    pub alert_on_failure: bool,
}

/// Source side of a pattern rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMatcher {
    /// `*` publisher: any source.
    Any,
    /// A single named publisher.
    Exact(ComponentId),
}

impl SourceMatcher {
    pub fn matches(&self, source: &ComponentId) -> bool {
        match self {
            SourceMatcher::Any => true,
            SourceMatcher::Exact(id) => id == source,
        }
    }
}

/// A rule that applies to every event whose source and type match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub source: SourceMatcher,
    pub pattern: EventPattern,
    pub rule: RoutingRule,
}

impl PatternRule {
    pub fn matches(&self, source: &ComponentId, event_type: &str) -> bool {
        self.source.matches(source) && self.pattern.matches(event_type)
    }
}

/// The outcome of resolving one event against a routing map.
///
/// Targets are the union of every matching rule; policy metadata comes from
/// the exact-key rules when any matched, otherwise from the pattern rules.
/// Within the chosen tier, metadata combines strictly (flags OR, thresholds
/// and priority MAX).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedRoute {
    pub targets: Vec<ComponentId>,
    pub requires_constitutional_validation: bool,
    pub min_trust_score: Option<f64>,
    pub priority_level: u32,
    /// Event type listed in `routing_rules.priority_events`.
    pub listed_priority: bool,
    pub audit_required: bool,
    pub alert_on_failure: bool,
    /// At least one exact `(source, event_type)` rule matched.
    pub matched_exact: bool,
    /// Ids of the rules that contributed policy metadata.
    pub rule_ids: Vec<String>,
    /// Any rule (exact or pattern) matched.
    pub matched_any: bool,
    /// Version of the map this route was resolved against.
    pub map_version: u64,
}

impl ResolvedRoute {
    /// Fold a rule's metadata into the route.
    pub(crate) fn absorb_policy(&mut self, rule: &RoutingRule) {
        self.requires_constitutional_validation |= rule.requires_constitutional_validation;
        self.min_trust_score = match (self.min_trust_score, rule.min_trust_score) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.priority_level = self.priority_level.max(rule.priority_level);
        self.audit_required |= rule.audit_required;
        self.alert_on_failure |= rule.alert_on_failure;
        self.rule_ids.push(rule.rule_id.clone());
    }

    /// Append targets, skipping duplicates while preserving first-seen order.
    pub fn add_targets<'a>(&mut self, targets: impl IntoIterator<Item = &'a ComponentId>) {
        for target in targets {
            if !self.targets.contains(target) {
                self.targets.push(target.clone());
            }
        }
    }

    /// Whether the event should travel through the priority lane.
    pub fn is_priority(&self, cutoff: u32) -> bool {
        self.listed_priority || self.priority_level > cutoff
    }

    /// Stable key identifying the rule set behind this route.
    pub fn rule_key(&self) -> String {
        self.rule_ids.join(",")
    }
}
