//! # Routing Map
//!
//! The compiled, immutable product of a validated catalogue. A map is never
//! mutated after construction; reloads build a new map and swap it in.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use shared_types::{ComponentId, EventPattern, RouteKey};

use crate::catalogue::{EventDefinition, RouteCatalogue, ANY_PUBLISHER, GROUP_PREFIX};
use crate::errors::ConfigError;
use crate::rule::{PatternRule, ResolvedRoute, RoutingRule, SourceMatcher};

/// Compiled lookup from `(source, event_type)` to rules, plus pattern rules.
#[derive(Debug, Clone)]
pub struct RoutingMap {
    exact: HashMap<RouteKey, Vec<RoutingRule>>,
    patterns: Vec<PatternRule>,
    priority_events: Vec<EventPattern>,
    audit_events: Vec<EventPattern>,
    alert_events: Vec<EventPattern>,
    components: BTreeSet<ComponentId>,
    groups: BTreeMap<String, Vec<ComponentId>>,
    version: u64,
    loaded_at: DateTime<Utc>,
}

impl Default for RoutingMap {
    fn default() -> Self {
        Self::empty()
    }
}

impl RoutingMap {
    /// A map with no rules. Every event resolves as unrouted.
    pub fn empty() -> Self {
        Self {
            exact: HashMap::new(),
            patterns: Vec::new(),
            priority_events: Vec::new(),
            audit_events: Vec::new(),
            alert_events: Vec::new(),
            components: BTreeSet::new(),
            groups: BTreeMap::new(),
            version: 0,
            loaded_at: Utc::now(),
        }
    }

    /// Validate and compile a catalogue.
    ///
    /// Duplicate `(source, event_type)` definitions append to the same rule
    /// list. Definitions with a wildcard event type or a `*` publisher become
    /// pattern rules, kept in declaration order.
    pub fn compile(catalogue: &RouteCatalogue) -> Result<Self, ConfigError> {
        catalogue.validate()?;

        let groups: BTreeMap<String, Vec<ComponentId>> = catalogue
            .subscriber_groups
            .iter()
            .map(|(name, members)| {
                (
                    name.clone(),
                    members.iter().map(|m| ComponentId::new(m.as_str())).collect(),
                )
            })
            .collect();

        let audit: HashSet<&str> = catalogue
            .routing_rules
            .audit_events
            .iter()
            .map(String::as_str)
            .collect();
        let alert: HashSet<&str> = catalogue
            .routing_rules
            .alert_events
            .iter()
            .map(String::as_str)
            .collect();

        let mut exact: HashMap<RouteKey, Vec<RoutingRule>> = HashMap::new();
        let mut patterns = Vec::new();

        for (index, def) in catalogue.events.iter().enumerate() {
            let pattern = parse_pattern(&def.event_type)?;
            let targets = expand_subscribers(def, &groups);
            let audit_required = def.audit_required || audit.contains(def.event_type.as_str());
            let alert_on_failure = def.alert_on_failure || alert.contains(def.event_type.as_str());

            let mut seen = HashSet::new();
            for publisher in def.publishers.iter().filter(|p| seen.insert(p.as_str())) {
                let rule = RoutingRule {
                    rule_id: format!("{}@{}#{}", def.event_type, publisher, index),
                    targets: targets.clone(),
                    requires_constitutional_validation: def.requires_constitutional_validation,
                    min_trust_score: def.min_trust_score,
                    priority_level: def.priority_level,
                    audit_required,
                    alert_on_failure,
                };

                if publisher == ANY_PUBLISHER || pattern.is_wildcard() {
                    let source = if publisher == ANY_PUBLISHER {
                        SourceMatcher::Any
                    } else {
                        SourceMatcher::Exact(ComponentId::new(publisher.as_str()))
                    };
                    patterns.push(PatternRule {
                        source,
                        pattern: pattern.clone(),
                        rule,
                    });
                } else {
                    exact
                        .entry(RouteKey::new(publisher.as_str(), def.event_type.as_str()))
                        .or_default()
                        .push(rule);
                }
            }
        }

        let rules = &catalogue.routing_rules;
        let priority_events = parse_patterns(&rules.priority_events)?;
        let audit_events = parse_patterns(&rules.audit_events)?;
        let alert_events = parse_patterns(&rules.alert_events)?;

        let components = catalogue
            .known_components()
            .into_iter()
            .map(ComponentId::from)
            .collect();

        Ok(Self {
            exact,
            patterns,
            priority_events,
            audit_events,
            alert_events,
            components,
            groups,
            version: 0,
            loaded_at: Utc::now(),
        })
    }

    /// Resolve the route for an event.
    ///
    /// Targets are the union of the exact rules followed by matching pattern
    /// rules. Policy metadata comes from the exact rules when any matched,
    /// otherwise from the pattern rules.
    pub fn resolve(&self, source: &ComponentId, event_type: &str) -> ResolvedRoute {
        let mut route = ResolvedRoute {
            listed_priority: self.priority_events.iter().any(|p| p.matches(event_type)),
            map_version: self.version,
            ..Default::default()
        };

        if let Some(rules) = self.exact.get(&RouteKey::new(source.clone(), event_type)) {
            route.matched_exact = true;
            for rule in rules {
                route.add_targets(&rule.targets);
                route.absorb_policy(rule);
            }
        }

        let mut matched_pattern = false;
        for pattern_rule in self
            .patterns
            .iter()
            .filter(|p| p.matches(source, event_type))
        {
            matched_pattern = true;
            route.add_targets(&pattern_rule.rule.targets);
            if !route.matched_exact {
                route.absorb_policy(&pattern_rule.rule);
            }
        }

        route.matched_any = route.matched_exact || matched_pattern;
        if route.matched_any {
            // Listed types may be routed only through a pattern definition
            route.audit_required |= self.audit_events.iter().any(|p| p.matches(event_type));
            route.alert_on_failure |= self.alert_events.iter().any(|p| p.matches(event_type));
        }
        route
    }

    /// Rules registered for an exact key.
    pub fn exact_rules(&self, key: &RouteKey) -> &[RoutingRule] {
        self.exact.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pattern rules in declaration order.
    pub fn pattern_rules(&self) -> &[PatternRule] {
        &self.patterns
    }

    /// Number of exact keys plus pattern rules.
    pub fn rule_count(&self) -> usize {
        self.exact.values().map(Vec::len).sum::<usize>() + self.patterns.len()
    }

    /// All component ids the catalogue mentions.
    pub fn components(&self) -> &BTreeSet<ComponentId> {
        &self.components
    }

    /// Subscriber groups after compilation.
    pub fn groups(&self) -> &BTreeMap<String, Vec<ComponentId>> {
        &self.groups
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

fn parse_pattern(raw: &str) -> Result<EventPattern, ConfigError> {
    EventPattern::parse(raw).map_err(|source| ConfigError::InvalidPattern {
        event_type: raw.to_string(),
        source,
    })
}

fn parse_patterns(raw: &[String]) -> Result<Vec<EventPattern>, ConfigError> {
    raw.iter().map(|e| parse_pattern(e)).collect()
}

/// Expand `@group` references in place, dropping duplicates.
fn expand_subscribers(
    def: &EventDefinition,
    groups: &BTreeMap<String, Vec<ComponentId>>,
) -> Vec<ComponentId> {
    let mut targets: Vec<ComponentId> = Vec::with_capacity(def.subscribers.len());
    let mut push = |id: &ComponentId| {
        if !targets.contains(id) {
            targets.push(id.clone());
        }
    };

    for subscriber in &def.subscribers {
        match subscriber.strip_prefix(GROUP_PREFIX) {
            Some(group) => {
                for member in groups.get(group).into_iter().flatten() {
                    push(member);
                }
            }
            None => push(&ComponentId::new(subscriber.as_str())),
        }
    }
    targets
}
