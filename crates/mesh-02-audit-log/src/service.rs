//! # Audit Log Service
//!
//! `ImmutableAuditLog` wires the hash chain, indexes and heartbeat policy to
//! a `LedgerStore`.
//!
//! ## Concurrency
//!
//! - Appends are serialized by a single async writer lock held across
//!   "read tail, seal, persist, publish". Waiting appenders queue; a wait
//!   longer than `lock_timeout` counts as transient contention and is
//!   retried with exponential backoff.
//! - Readers (queries, verification) take a short read lock on the
//!   published state. Verification clones the entry pointers and walks the
//!   snapshot without holding any lock.
//! - An entry becomes visible to readers only after the store accepted it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mesh_telemetry::{
    log_mesh_event, metric_inc, AUDIT_APPENDS, AUDIT_APPEND_FAILURES, AUDIT_INTEGRITY_BREAKS,
    AUDIT_LEDGER_LENGTH,
};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::adapters::InMemoryLedgerStore;
use crate::domain::entry::{AuditRecord, ImmutableLogEntry, Sequence};
use crate::domain::errors::{AuditError, StoreError};
use crate::domain::hash_chain::GENESIS_HASH;
use crate::domain::heartbeat::{HeartbeatPolicy, SubsystemGap};
use crate::domain::index::{select, LedgerIndex};
use crate::domain::integrity::{verify_chain, IntegrityReport};
use crate::domain::query::AuditFilter;
use crate::ports::inbound::AuditLogApi;
use crate::ports::outbound::{LedgerStore, SystemTimeSource, TimeSource};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Retry and liveness settings for the ledger.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Total append attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub initial_backoff: Duration,
    /// How long one attempt waits for the writer lock.
    pub lock_timeout: Duration,
    pub heartbeats: HeartbeatPolicy,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            lock_timeout: Duration::from_millis(1000),
            heartbeats: HeartbeatPolicy::default(),
        }
    }
}

impl AuditConfig {
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_heartbeats(mut self, heartbeats: HeartbeatPolicy) -> Self {
        self.heartbeats = heartbeats;
        self
    }
}

/// Append counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub entries: u64,
    pub appended: u64,
    pub failures: u64,
    pub retries: u64,
}

// =============================================================================
// LEDGER STATE
// =============================================================================

#[derive(Default)]
struct LedgerState {
    entries: Vec<Arc<ImmutableLogEntry>>,
    index: LedgerIndex,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl LedgerState {
    fn publish(&mut self, entry: ImmutableLogEntry) {
        let position = self.entries.len();
        self.index.insert(position, &entry);
        let seen = self
            .last_seen
            .entry(entry.subsystem.clone())
            .or_insert(entry.timestamp);
        *seen = (*seen).max(entry.timestamp);
        self.entries.push(Arc::new(entry));
    }

    /// Sequence, previous hash and minimum timestamp for the next entry.
    fn next_link(&self) -> (Sequence, String, Option<DateTime<Utc>>) {
        match self.entries.last() {
            Some(tail) => (tail.sequence + 1, tail.entry_hash.clone(), Some(tail.timestamp)),
            None => (0, GENESIS_HASH.to_string(), None),
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Single-writer, append-only, hash-chained audit ledger.
pub struct ImmutableAuditLog<S: LedgerStore> {
    writer: Mutex<S>,
    state: RwLock<LedgerState>,
    config: AuditConfig,
    clock: Arc<dyn TimeSource>,
    opened_at: DateTime<Utc>,
    appended: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    last_report: RwLock<Option<IntegrityReport>>,
    breaks: RwLock<Vec<IntegrityReport>>,
}

impl ImmutableAuditLog<InMemoryLedgerStore> {
    /// Empty ledger that lives only in memory.
    pub fn new_in_memory(config: AuditConfig) -> Self {
        Self::with_clock(
            InMemoryLedgerStore::new(),
            Vec::new(),
            config,
            Arc::new(SystemTimeSource),
        )
    }
}

impl<S: LedgerStore> ImmutableAuditLog<S> {
    /// Open a ledger over a store, reloading and verifying what it holds.
    ///
    /// A broken persisted chain is logged and recorded but does not prevent
    /// further appends.
    pub fn open(store: S, config: AuditConfig) -> Result<Self, AuditError> {
        Self::open_with_clock(store, config, Arc::new(SystemTimeSource))
    }

    pub fn open_with_clock(
        store: S,
        config: AuditConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, AuditError> {
        let existing = store.load_all().map_err(AuditError::Open)?;
        let restored = existing.len();
        let log = Self::with_clock(store, existing, config, clock);

        if restored > 0 {
            let report = log.verify_integrity();
            log_mesh_event!(
                info,
                "audit",
                "Restored audit ledger",
                entries = restored,
                chain_valid = report.valid
            );
        }
        Ok(log)
    }

    fn with_clock(
        store: S,
        existing: Vec<ImmutableLogEntry>,
        config: AuditConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let mut state = LedgerState::default();
        for entry in existing {
            state.publish(entry);
        }
        AUDIT_LEDGER_LENGTH.set(state.entries.len() as f64);

        Self {
            writer: Mutex::new(store),
            state: RwLock::new(state),
            opened_at: clock.now(),
            config,
            clock,
            appended: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            last_report: RwLock::new(None),
            breaks: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// `entry_hash` of the current tail, or the genesis constant.
    pub fn tail_hash(&self) -> String {
        self.state.read().next_link().1
    }

    /// Every break found by verification since the ledger opened.
    pub fn integrity_breaks(&self) -> Vec<IntegrityReport> {
        self.breaks.read().clone()
    }

    /// Seal and persist a record, retrying transient failures.
    pub async fn append(&self, record: AuditRecord) -> Result<Sequence, AuditError> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        let mut backoff = self.config.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.try_append(&record, &payload).await {
                Ok(sequence) => {
                    self.appended.fetch_add(1, Ordering::Relaxed);
                    metric_inc!(AUDIT_APPENDS);
                    return Ok(sequence);
                }
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    log_mesh_event!(
                        debug,
                        "audit",
                        "Retrying audit append",
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    metric_inc!(AUDIT_APPEND_FAILURES);
                    log_mesh_event!(
                        error,
                        "audit",
                        "Audit append failed",
                        attempts = attempt,
                        action = %record.action,
                        resource = %record.resource,
                        error = %err
                    );
                    return Err(AuditError::AppendFailed {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    async fn try_append(&self, record: &AuditRecord, payload: &str) -> Result<Sequence, StoreError> {
        let mut store = tokio::time::timeout(self.config.lock_timeout, self.writer.lock())
            .await
            .map_err(|_| StoreError::Contention)?;

        // Only the writer-lock holder changes the tail.
        let (sequence, previous_hash, floor) = self.state.read().next_link();
        let now = self.clock.now();
        let timestamp = floor.map_or(now, |f| now.max(f));

        let entry =
            ImmutableLogEntry::seal(sequence, record, payload.to_string(), previous_hash, timestamp);
        store.append(&entry)?;

        let len = {
            let mut state = self.state.write();
            state.publish(entry);
            state.entries.len()
        };
        drop(store);

        AUDIT_LEDGER_LENGTH.set(len as f64);
        Ok(sequence)
    }

    /// Verify the chain up to the tail observed now.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let snapshot: Vec<Arc<ImmutableLogEntry>> = self.state.read().entries.clone();
        let report = verify_chain(snapshot.iter().map(Arc::as_ref));

        if !report.valid {
            metric_inc!(AUDIT_INTEGRITY_BREAKS);
            log_mesh_event!(
                error,
                "audit",
                "Audit hash chain broken",
                critical = true,
                broken_at = ?report.broken_at,
                entries_verified = report.entries_verified
            );
            let mut breaks = self.breaks.write();
            let already_known = breaks
                .last()
                .is_some_and(|b| b.broken_at == report.broken_at);
            if !already_known {
                breaks.push(report.clone());
            }
        }

        *self.last_report.write() = Some(report.clone());
        report
    }

    pub fn get_entries(&self, filter: &AuditFilter, limit: usize) -> Vec<ImmutableLogEntry> {
        let state = self.state.read();
        select(&state.entries, &state.index, filter, limit)
    }

    pub fn replay(&self, correlation_id: &str) -> Vec<ImmutableLogEntry> {
        self.get_entries(&AuditFilter::new().correlation_id(correlation_id), usize::MAX)
    }

    pub fn detect_gaps(&self, now: DateTime<Utc>) -> Vec<SubsystemGap> {
        let gaps = {
            let state = self.state.read();
            self.config
                .heartbeats
                .detect(&state.last_seen, self.opened_at, now)
        };
        for gap in &gaps {
            log_mesh_event!(
                warn,
                "audit",
                "Subsystem heartbeat missing",
                subsystem = %gap.subsystem,
                silent_secs = gap.silent_for.as_secs()
            );
        }
        gaps
    }

    pub fn len(&self) -> u64 {
        self.state.read().entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            entries: self.len(),
            appended: self.appended.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    pub fn last_integrity_report(&self) -> Option<IntegrityReport> {
        self.last_report.read().clone()
    }

    /// Rewrite a published entry in place without touching its hashes.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn tamper_with_entry(
        &self,
        sequence: Sequence,
        mutate: impl FnOnce(&mut ImmutableLogEntry),
    ) -> bool {
        let mut state = self.state.write();
        match state.entries.iter_mut().find(|e| e.sequence == sequence) {
            Some(slot) => {
                let mut entry = ImmutableLogEntry::clone(slot);
                mutate(&mut entry);
                *slot = Arc::new(entry);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl<S: LedgerStore> AuditLogApi for ImmutableAuditLog<S> {
    async fn append(&self, record: AuditRecord) -> Result<Sequence, AuditError> {
        ImmutableAuditLog::append(self, record).await
    }

    fn verify_integrity(&self) -> IntegrityReport {
        ImmutableAuditLog::verify_integrity(self)
    }

    fn get_entries(&self, filter: &AuditFilter, limit: usize) -> Vec<ImmutableLogEntry> {
        ImmutableAuditLog::get_entries(self, filter, limit)
    }

    fn replay(&self, correlation_id: &str) -> Vec<ImmutableLogEntry> {
        ImmutableAuditLog::replay(self, correlation_id)
    }

    fn detect_gaps(&self, now: DateTime<Utc>) -> Vec<SubsystemGap> {
        ImmutableAuditLog::detect_gaps(self, now)
    }

    fn len(&self) -> u64 {
        ImmutableAuditLog::len(self)
    }

    fn stats(&self) -> AuditStats {
        ImmutableAuditLog::stats(self)
    }

    fn last_integrity_report(&self) -> Option<IntegrityReport> {
        ImmutableAuditLog::last_integrity_report(self)
    }
}
