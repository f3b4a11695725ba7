//! # Secondary Indexes
//!
//! Posting lists from field value to ledger positions, kept in append order.
//! A query walks the narrowest posting list that its filter names, clipped
//! to the time window found by binary search over the (non-decreasing)
//! entry timestamps.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use super::entry::ImmutableLogEntry;
use super::query::AuditFilter;

#[derive(Debug, Default)]
pub struct LedgerIndex {
    by_actor: HashMap<String, Vec<usize>>,
    by_action: HashMap<String, Vec<usize>>,
    by_resource: HashMap<String, Vec<usize>>,
    by_subsystem: HashMap<String, Vec<usize>>,
    by_correlation: HashMap<String, Vec<usize>>,
}

impl LedgerIndex {
    /// Index the entry stored at `position`.
    pub fn insert(&mut self, position: usize, entry: &ImmutableLogEntry) {
        push(&mut self.by_actor, &entry.actor, position);
        push(&mut self.by_action, &entry.action, position);
        push(&mut self.by_resource, &entry.resource, position);
        push(&mut self.by_subsystem, &entry.subsystem, position);
        if let Some(correlation) = &entry.correlation_id {
            push(&mut self.by_correlation, correlation, position);
        }
    }

    /// Shortest posting list among the indexed fields the filter sets.
    ///
    /// `None` means the filter names no indexed field.
    pub fn candidates(&self, filter: &AuditFilter) -> Option<&[usize]> {
        let lookups = [
            (&filter.actor, &self.by_actor),
            (&filter.action, &self.by_action),
            (&filter.resource, &self.by_resource),
            (&filter.subsystem, &self.by_subsystem),
            (&filter.correlation_id, &self.by_correlation),
        ];

        lookups
            .into_iter()
            .filter_map(|(wanted, map)| {
                wanted
                    .as_deref()
                    .map(|value| map.get(value).map_or(&[][..], Vec::as_slice))
            })
            .min_by_key(|positions| positions.len())
    }
}

fn push(map: &mut HashMap<String, Vec<usize>>, key: &str, position: usize) {
    match map.get_mut(key) {
        Some(positions) => positions.push(position),
        None => {
            map.insert(key.to_string(), vec![position]);
        }
    }
}

/// Positions whose timestamps fall inside the filter's time bounds.
fn time_window(entries: &[Arc<ImmutableLogEntry>], filter: &AuditFilter) -> Range<usize> {
    let start = filter
        .since
        .map_or(0, |since| entries.partition_point(|e| e.timestamp < since));
    let end = filter
        .until
        .map_or(entries.len(), |until| entries.partition_point(|e| e.timestamp < until));
    start..end.max(start)
}

/// Run a filter against the ledger, returning at most `limit` entries in
/// ascending sequence order.
pub fn select(
    entries: &[Arc<ImmutableLogEntry>],
    index: &LedgerIndex,
    filter: &AuditFilter,
    limit: usize,
) -> Vec<ImmutableLogEntry> {
    let window = time_window(entries, filter);

    match index.candidates(filter) {
        Some(positions) => {
            let first = positions.partition_point(|p| *p < window.start);
            positions[first..]
                .iter()
                .take_while(|p| **p < window.end)
                .map(|p| &entries[*p])
                .filter(|e| filter.matches(e))
                .take(limit)
                .map(|e| ImmutableLogEntry::clone(e))
                .collect()
        }
        None => entries[window]
            .iter()
            .filter(|e| filter.matches(e))
            .take(limit)
            .map(|e| ImmutableLogEntry::clone(e))
            .collect(),
    }
}
