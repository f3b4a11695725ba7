//! # Priority Lane Scenarios
//!
//! A priority event queued behind a backlog of normal events must be
//! delivered ahead of nearly all of them.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mesh_03_dispatcher::{DeliveryStatus, DispatcherConfig, Lane};
    use shared_types::TriggerEvent;

    use crate::integration::fixtures::{Recorder, TestMesh, GOVERNANCE_ROUTES};

    const BACKLOG: usize = 100;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_priority_event_overtakes_backlog() {
        let recorder = Recorder::with_delay(Duration::from_millis(1));
        let mesh = TestMesh::with_recorder(
            GOVERNANCE_ROUTES,
            DispatcherConfig::default().with_workers(2),
            recorder,
        );

        // Queue everything before any worker exists.
        let mut tickets = Vec::with_capacity(BACKLOG + 1);
        for i in 0..BACKLOG {
            let event = TriggerEvent::new("chat.message", "chat", format!("user-{i}"));
            let submission = mesh.dispatcher.submit(event).await;
            assert!(submission.is_enqueued());
            tickets.push(submission);
        }
        let urgent = TriggerEvent::new("incident.raised", "monitoring", "pager");
        let urgent_id = urgent.id();
        let submission = mesh.dispatcher.submit(urgent).await;
        assert!(submission.is_enqueued());
        tickets.push(submission);

        let stats = mesh.dispatcher.get_stats();
        assert_eq!(stats.lane_depth_normal, BACKLOG);
        assert_eq!(stats.lane_depth_priority, 1);

        mesh.dispatcher.start().unwrap();
        let reports = futures::future::join_all(tickets.into_iter().map(|t| t.wait())).await;
        assert!(reports.iter().all(|r| r.status == DeliveryStatus::Delivered));

        let urgent_report = reports.iter().find(|r| r.event_id == urgent_id).unwrap();
        assert_eq!(urgent_report.lane, Some(Lane::Priority));

        let invocations = mesh.recorder.invocations();
        assert_eq!(invocations.len(), BACKLOG + 1);
        let urgent_at = invocations
            .iter()
            .find(|i| i.event_id == urgent_id)
            .map(|i| i.at)
            .unwrap();
        let overtaken = invocations
            .iter()
            .filter(|i| i.event_type == "chat.message" && i.at > urgent_at)
            .count();
        assert!(
            overtaken * 100 >= BACKLOG * 95,
            "priority event overtook only {overtaken} of {BACKLOG} normal events"
        );

        let report = mesh.dispatcher.stop().await;
        assert!(report.drained);
    }

    #[tokio::test]
    async fn test_high_priority_level_uses_priority_lane() {
        const ROUTES: &str = r#"
events:
  - event_type: system.restart
    publishers: ["*"]
    subscribers: [operator]
    priority_level: 9
  - event_type: system.tick
    publishers: ["*"]
    subscribers: [operator]
    priority_level: 2
"#;
        let mesh = TestMesh::running(ROUTES, DispatcherConfig::default());

        let high = mesh
            .dispatcher
            .emit(TriggerEvent::new("system.restart", "watchdog", "cron"))
            .await;
        let low = mesh
            .dispatcher
            .emit(TriggerEvent::new("system.tick", "watchdog", "cron"))
            .await;

        assert_eq!(high.lane, Some(Lane::Priority));
        assert_eq!(low.lane, Some(Lane::Normal));
    }
}
