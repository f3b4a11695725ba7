//! # Validation Gate Scenarios
//!
//! Trusted delivery, low-trust blocking and unrouted events, end to end
//! through a loaded catalogue and a real ledger.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mesh_03_dispatcher::{
        trust_scorer_fn, validator_fn, Alert, AlertHook, BlockReason, DeliveryStatus, DispatcherConfig,
    };
    use parking_lot::Mutex;
    use shared_types::{ComponentId, TriggerEvent};

    use crate::integration::fixtures::{TestMesh, GOVERNANCE_ROUTES};

    fn violation(trust: f64) -> TriggerEvent {
        TriggerEvent::new("governance.policy_violation", "governance_engine", "agent-7")
            .with_resource("policy/data-retention")
            .with_field("rule", "retention.max_days")
            .with_trust_score(trust)
    }

    fn trusting_mesh() -> TestMesh {
        TestMesh::running(
            GOVERNANCE_ROUTES,
            DispatcherConfig::default().with_trust_fallback(true),
        )
    }

    // =============================================================================
    // TRUST THRESHOLD
    // =============================================================================

    #[tokio::test]
    async fn test_trusted_violation_reaches_every_subscriber() {
        let mesh = trusting_mesh();
        let before = mesh.dispatcher.get_stats();

        let event = violation(0.95);
        let event_id = event.id();
        let report = mesh.dispatcher.emit(event).await;

        assert_eq!(report.status, DeliveryStatus::Delivered);
        assert_eq!(report.delivered_count(), 2);

        let mut targets = mesh.recorder.targets_for(event_id);
        targets.sort();
        assert_eq!(
            targets,
            vec![ComponentId::new("alert_system"), ComponentId::new("immutable_log")]
        );

        let entries = mesh.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "event.routed");
        assert_eq!(entries[0].result, "success");
        assert_eq!(entries[0].actor, "agent-7");
        assert_eq!(entries[0].resource, "policy/data-retention");
        assert_eq!(entries[0].subsystem, "governance_engine");
        assert_eq!(report.audit_sequence, Some(entries[0].sequence));

        let after = mesh.dispatcher.get_stats();
        assert_eq!(after.events_routed, before.events_routed + 1);
        assert_eq!(after.events_blocked, before.events_blocked);
        assert_eq!(after.events_validated, before.events_validated + 1);
    }

    #[tokio::test]
    async fn test_low_trust_violation_is_blocked_and_audited_once() {
        let mesh = trusting_mesh();

        let report = mesh.dispatcher.emit(violation(0.5)).await;

        assert!(matches!(
            report.status,
            DeliveryStatus::Blocked(BlockReason::TrustScoreTooLow { threshold, .. }) if threshold == 0.9
        ));
        assert!(report.targets.is_empty());
        assert_eq!(mesh.recorder.count(), 0);

        let entries = mesh.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "event.blocked");
        assert_eq!(entries[0].result, "blocked");

        let payload = entries[0].payload_json().unwrap();
        assert_eq!(payload["reason"]["reason"], "trust_score_too_low");

        let stats = mesh.dispatcher.get_stats();
        assert_eq!(stats.events_blocked, 1);
        assert_eq!(stats.blocked_by_reason.get("trust_score_too_low"), Some(&1));
    }

    #[tokio::test]
    async fn test_blocked_violation_raises_alert() {
        let mesh = trusting_mesh();
        let alerts: Arc<Mutex<Vec<Alert>>> = Arc::default();
        let sink = Arc::clone(&alerts);
        let hook: Arc<dyn AlertHook> = Arc::new(move |alert: &Alert| sink.lock().push(alert.clone()));
        mesh.dispatcher.set_alert_hook(hook);

        mesh.dispatcher.emit(violation(0.2)).await;

        let alerts = alerts.lock();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(&alerts[0], Alert::Blocked { event_type, .. } if event_type == "governance.policy_violation"));
    }

    #[tokio::test]
    async fn test_scorer_overrides_producer_trust() {
        let mesh = trusting_mesh();
        mesh.dispatcher
            .set_trust_scorer(trust_scorer_fn(|source: ComponentId| async move {
                if source.as_str() == "governance_engine" {
                    0.3
                } else {
                    1.0
                }
            }));

        // The producer claims full trust, the scorer disagrees.
        let report = mesh.dispatcher.emit(violation(1.0)).await;
        assert!(report.status.is_blocked());
    }

    // =============================================================================
    // CONSTITUTIONAL CHECK
    // =============================================================================

    #[tokio::test]
    async fn test_flagged_event_is_checked_by_validator() {
        let mesh = trusting_mesh();
        mesh.dispatcher.set_governance_validator(validator_fn(
            |event: TriggerEvent| async move { event.actor != "rogue" },
        ));

        let rejected = TriggerEvent::new("chat.message", "chat", "rogue").requiring_validation();
        let report = mesh.dispatcher.emit(rejected).await;
        assert_eq!(
            report.status,
            DeliveryStatus::Blocked(BlockReason::ConstitutionalRejected)
        );

        let accepted = TriggerEvent::new("chat.message", "chat", "alice").requiring_validation();
        let report = mesh.dispatcher.emit(accepted).await;
        assert_eq!(report.status, DeliveryStatus::Delivered);

        // Blocked entry plus the forced audit of the accepted event.
        let actions: Vec<String> = mesh.audit_entries().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["event.blocked", "event.routed"]);
    }

    // =============================================================================
    // UNROUTED
    // =============================================================================

    #[tokio::test]
    async fn test_unknown_event_type_is_unrouted() {
        let mesh = trusting_mesh();

        let report = mesh
            .dispatcher
            .emit(TriggerEvent::new("nonexistent.event", "anyone", "agent"))
            .await;

        assert_eq!(report.status, DeliveryStatus::Unrouted);
        assert!(report.targets.is_empty());
        assert_eq!(mesh.recorder.count(), 0);
        assert!(mesh.audit_entries().is_empty());
        assert_eq!(mesh.dispatcher.get_stats().events_unrouted, 1);
    }

    #[tokio::test]
    async fn test_unlisted_publisher_is_unrouted() {
        let mesh = trusting_mesh();

        let report = mesh
            .dispatcher
            .emit(TriggerEvent::new("governance.policy_violation", "chat", "agent"))
            .await;

        assert_eq!(report.status, DeliveryStatus::Unrouted);
        assert!(mesh.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn test_audit_chain_stays_valid_across_outcomes() {
        let mesh = trusting_mesh();
        for trust in [0.95, 0.1, 0.99, 0.5] {
            mesh.dispatcher.emit(violation(trust)).await;
        }

        assert_eq!(mesh.audit_entries().len(), 4);
        let report = mesh.dispatcher.verify_audit_integrity();
        assert!(report.valid);
        assert_eq!(report.entries_verified, 4);
    }
}
