//! # Audit Ledger Integration
//!
//! Chain linkage under concurrent writers, persistence across reopen, and
//! tamper detection on both the file and the in-memory view.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mesh_02_audit_log::{
        AuditConfig, AuditFilter, AuditRecord, ChainBreak, ImmutableAuditLog,
        JsonLinesLedgerStore, GENESIS_HASH,
    };
    use serde_json::{json, Value};

    fn record(i: usize) -> AuditRecord {
        AuditRecord::new(
            format!("agent-{}", i % 3),
            "policy.evaluated",
            format!("policy-{i}"),
            "governance",
        )
        .with_payload(json!({ "iteration": i }))
    }

    fn open_file_ledger(path: &std::path::Path) -> ImmutableAuditLog<JsonLinesLedgerStore> {
        let store = JsonLinesLedgerStore::open(path, false).unwrap();
        ImmutableAuditLog::open(store, AuditConfig::default()).unwrap()
    }

    // =============================================================================
    // CHAIN LINKAGE
    // =============================================================================

    #[tokio::test]
    async fn test_entries_link_from_genesis() {
        let ledger = ImmutableAuditLog::new_in_memory(AuditConfig::default());
        for i in 0..10 {
            ledger.append(record(i)).await.unwrap();
        }

        let entries = ledger.get_entries(&AuditFilter::default(), usize::MAX);
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].previous_hash, GENESIS_HASH);
        for pair in entries.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].entry_hash);
            assert_eq!(pair[1].sequence, pair[0].sequence + 1);
            assert!(pair[1].timestamp >= pair[0].timestamp);
        }
        for entry in &entries {
            assert_eq!(entry.recompute_hash(), entry.entry_hash);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_form_one_chain() {
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 25;

        let ledger = Arc::new(ImmutableAuditLog::new_in_memory(AuditConfig::default()));
        let tasks: Vec<_> = (0..WRITERS)
            .map(|w| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    let mut sequences = Vec::with_capacity(PER_WRITER);
                    for i in 0..PER_WRITER {
                        sequences.push(ledger.append(record(w * PER_WRITER + i)).await.unwrap());
                    }
                    sequences
                })
            })
            .collect();

        let mut sequences: Vec<u64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .flat_map(|r| r.unwrap())
            .collect();
        sequences.sort_unstable();

        let total = (WRITERS * PER_WRITER) as u64;
        assert_eq!(sequences, (0..total).collect::<Vec<_>>());

        let report = ledger.verify_integrity();
        assert!(report.valid);
        assert_eq!(report.entries_verified, total);
        assert!(report.broken_at.is_none());
    }

    // =============================================================================
    // PERSISTENCE
    // =============================================================================

    #[tokio::test]
    async fn test_reopened_ledger_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let tail = {
            let ledger = open_file_ledger(&path);
            for i in 0..5 {
                ledger.append(record(i)).await.unwrap();
            }
            ledger.tail_hash()
        };

        let ledger = open_file_ledger(&path);
        assert_eq!(ledger.len(), 5);
        assert_eq!(ledger.tail_hash(), tail);

        let sequence = ledger.append(record(5)).await.unwrap();
        assert_eq!(sequence, 5);

        let report = ledger.verify_integrity();
        assert!(report.valid);
        assert_eq!(report.entries_verified, 6);
    }

    // =============================================================================
    // TAMPER DETECTION
    // =============================================================================

    #[tokio::test]
    async fn test_edited_ledger_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = open_file_ledger(&path);
            for i in 0..6 {
                ledger.append(record(i)).await.unwrap();
            }
        }

        // Rewrite the payload of sequence 3, leaving its hashes alone.
        let contents = std::fs::read_to_string(&path).unwrap();
        let rewritten: Vec<String> = contents
            .lines()
            .map(|line| {
                let mut entry: Value = serde_json::from_str(line).unwrap();
                if entry["sequence"] == 3 {
                    entry["payload"] = Value::String(json!({ "iteration": 999 }).to_string());
                }
                serde_json::to_string(&entry).unwrap()
            })
            .collect();
        std::fs::write(&path, rewritten.join("\n") + "\n").unwrap();

        let ledger = open_file_ledger(&path);
        let report = ledger.verify_integrity();
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(3));
        assert_eq!(report.entries_verified, 3);
        assert_eq!(report.break_kind, Some(ChainBreak::EntryHashMismatch));
        assert!(!ledger.integrity_breaks().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_tamper_is_detected() {
        let ledger = ImmutableAuditLog::new_in_memory(AuditConfig::default());
        for i in 0..4 {
            ledger.append(record(i)).await.unwrap();
        }
        assert!(ledger.verify_integrity().valid);

        assert!(ledger.tamper_with_entry(1, |entry| entry.actor = "mallory".into()));

        let report = ledger.verify_integrity();
        assert!(!report.valid);
        assert_eq!(report.broken_at, Some(1));
        assert_eq!(ledger.last_integrity_report(), Some(report));
    }

    #[tokio::test]
    async fn test_untouched_ledger_verifies_every_entry() {
        let ledger = ImmutableAuditLog::new_in_memory(AuditConfig::default());
        for i in 0..50 {
            ledger.append(record(i)).await.unwrap();
        }
        let report = ledger.verify_integrity();
        assert!(report.valid);
        assert_eq!(report.entries_verified, 50);
    }
}
