//! # Hot Reload Scenarios
//!
//! A rejected catalogue never replaces the active map; an accepted one takes
//! effect for the next emitted event.

#[cfg(test)]
mod tests {
    use mesh_01_routing_config::ConfigError;
    use mesh_03_dispatcher::{DeliveryStatus, DispatcherConfig};
    use shared_types::TriggerEvent;

    use crate::integration::fixtures::{rewrite, TestMesh, GOVERNANCE_ROUTES};

    const BROKEN_GROUP: &str = r#"
components: [archive]
events:
  - event_type: chat.message
    publishers: [chat]
    subscribers: ["@moderators"]
subscriber_groups:
  moderators: [archive, ghost_component]
"#;

    const UNDEFINED_GROUP: &str = r#"
events:
  - event_type: chat.message
    publishers: [chat]
    subscribers: ["@nobody"]
"#;

    fn chat() -> TriggerEvent {
        TriggerEvent::new("chat.message", "chat", "alice")
    }

    #[tokio::test]
    async fn test_broken_catalogue_keeps_active_map() {
        let mesh = TestMesh::running(GOVERNANCE_ROUTES, DispatcherConfig::default());
        assert_eq!(mesh.dispatcher.routing().version(), 1);

        rewrite(mesh.routes.path(), UNDEFINED_GROUP);
        let err = mesh.dispatcher.reload_config(mesh.routes.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownGroup { .. }), "{err}");
        assert_eq!(mesh.dispatcher.routing().version(), 1);

        let report = mesh.dispatcher.emit(chat()).await;
        assert_eq!(report.status, DeliveryStatus::Delivered);
        assert_eq!(report.map_version, 1);
        assert_eq!(report.targets[0].target.as_str(), "archive");
    }

    #[tokio::test]
    async fn test_dangling_group_member_is_rejected() {
        let mesh = TestMesh::running(GOVERNANCE_ROUTES, DispatcherConfig::default());

        rewrite(mesh.routes.path(), BROKEN_GROUP);
        let err = mesh.dispatcher.reload_config(mesh.routes.path()).unwrap_err();
        assert!(
            matches!(&err, ConfigError::DanglingGroupMember { member, .. } if member == "ghost_component"),
            "{err}"
        );

        let report = mesh.dispatcher.emit(chat()).await;
        assert_eq!(report.status, DeliveryStatus::Delivered);
        assert_eq!(mesh.dispatcher.get_stats().routing_map_version, 1);
    }

    #[tokio::test]
    async fn test_accepted_reload_routes_next_event() {
        let mesh = TestMesh::running(GOVERNANCE_ROUTES, DispatcherConfig::default());
        mesh.dispatcher.register_component_handler(
            "moderation_bot",
            mesh.recorder.handler("moderation_bot"),
        );

        rewrite(
            mesh.routes.path(),
            r#"
components: [moderation_bot]
events:
  - event_type: chat.message
    publishers: [chat]
    subscribers: [moderation_bot]
"#,
        );
        let version = mesh.dispatcher.reload_config(mesh.routes.path()).unwrap();
        assert_eq!(version, 2);

        let event = chat();
        let event_id = event.id();
        let report = mesh.dispatcher.emit(event).await;
        assert_eq!(report.map_version, 2);
        assert_eq!(
            mesh.recorder
                .targets_for(event_id)
                .iter()
                .map(|t| t.as_str().to_string())
                .collect::<Vec<_>>(),
            vec!["moderation_bot"]
        );

        // Rules dropped by the reload no longer route.
        let report = mesh
            .dispatcher
            .emit(TriggerEvent::new("incident.raised", "monitoring", "pager"))
            .await;
        assert_eq!(report.status, DeliveryStatus::Unrouted);
    }
}
