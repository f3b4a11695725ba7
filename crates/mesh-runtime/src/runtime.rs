//! # Mesh Runtime
//!
//! Owns the container and the background maintenance task.
//!
//! ## Lifecycle
//!
//! 1. `new`: build ledger, dispatcher, catalogue and handlers
//! 2. `start`: spawn dispatcher workers and the maintenance loop
//! 3. `reload`: swap the route catalogue (on SIGHUP)
//! 4. `shutdown`: stop the maintenance loop, drain the dispatcher

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use mesh_02_audit_log::{AuditLogApi, IntegrityReport, SubsystemGap};
use mesh_03_dispatcher::{EventDispatcher, ShutdownReport};
use mesh_telemetry::log_mesh_event;
use tokio::sync::watch;

use crate::container::{bind_logging_handlers, MeshConfig, MeshContainer};

/// Result of one maintenance pass.
#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub integrity: IntegrityReport,
    pub gaps: Vec<SubsystemGap>,
}

/// The node runtime.
pub struct MeshRuntime {
    container: Arc<MeshContainer>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MeshRuntime {
    pub fn new(config: MeshConfig) -> Result<Self> {
        let container = MeshContainer::build(config)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.container.dispatcher
    }

    pub fn ledger(&self) -> &Arc<dyn AuditLogApi> {
        &self.container.ledger
    }

    /// Start dispatcher workers and the periodic integrity + gap check.
    pub fn start(&self) -> Result<()> {
        self.container
            .dispatcher
            .start()
            .context("Failed to start dispatcher")?;

        let container = Arc::clone(&self.container);
        let mut shutdown = self.shutdown_rx.clone();
        let period = container.config.maintenance_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_maintenance(&container);
                    }
                    _ = shutdown.changed() => {
                        log_mesh_event!(debug, "runtime", "Maintenance loop stopping");
                        break;
                    }
                }
            }
        });

        log_mesh_event!(
            info,
            "runtime",
            "Mesh node running",
            routes = %self.container.config.routes_path.display(),
            workers = self.container.config.dispatcher.workers
        );
        Ok(())
    }

    /// Reload the route catalogue from the configured path. A rejected
    /// catalogue leaves the active map in place; an accepted one gets a
    /// logging handler for each component it introduced.
    pub fn reload(&self) -> Result<u64> {
        let path = &self.container.config.routes_path;
        match self.container.dispatcher.reload_config(path) {
            Ok(version) => {
                let bound = bind_logging_handlers(&self.container.dispatcher);
                log_mesh_event!(
                    info,
                    "runtime",
                    "Route catalogue reloaded",
                    map_version = version,
                    new_handlers = bound
                );
                Ok(version)
            }
            Err(err) => {
                log_mesh_event!(
                    error,
                    "runtime",
                    "Route catalogue reload rejected, keeping active map",
                    error = %err,
                    map_version = self.container.dispatcher.routing().version()
                );
                Err(err).with_context(|| format!("Reload of {} rejected", path.display()))
            }
        }
    }

    /// Run one integrity + gap check now.
    pub fn maintenance(&self) -> MaintenanceReport {
        run_maintenance(&self.container)
    }

    /// Stop the maintenance loop and drain the dispatcher.
    pub async fn shutdown(&self) -> ShutdownReport {
        log_mesh_event!(info, "runtime", "Initiating graceful shutdown");
        // Receivers may already be gone if the loop never started.
        let _ = self.shutdown_tx.send(true);

        let report = self.container.dispatcher.stop().await;
        let stats = self.container.dispatcher.get_stats();
        log_mesh_event!(
            info,
            "runtime",
            "Shutdown complete",
            events_emitted = stats.events_emitted,
            events_routed = stats.events_routed,
            events_blocked = stats.events_blocked,
            ledger_entries = self.container.ledger.len()
        );
        report
    }
}

fn run_maintenance(container: &MeshContainer) -> MaintenanceReport {
    let integrity = container.dispatcher.verify_audit_integrity();
    let gaps = container.ledger.detect_gaps(Utc::now());
    log_mesh_event!(
        debug,
        "runtime",
        "Maintenance pass complete",
        chain_valid = integrity.valid,
        entries_verified = integrity.entries_verified,
        gaps = gaps.len()
    );
    MaintenanceReport { integrity, gaps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::TriggerEvent;
    use std::io::Write;

    const ROUTES: &str = r#"
events:
  - event_type: governance.policy_violation
    publishers: [governance_engine]
    subscribers: [alert_system]
    audit_required: true
"#;

    fn runtime(routes: &tempfile::NamedTempFile) -> MeshRuntime {
        let config = MeshConfig {
            routes_path: routes.path().to_path_buf(),
            ..Default::default()
        };
        MeshRuntime::new(config).unwrap()
    }

    fn routes_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_runtime_routes_to_logging_handler() {
        let routes = routes_file(ROUTES);
        let runtime = runtime(&routes);
        runtime.start().unwrap();

        let report = runtime
            .dispatcher()
            .emit(TriggerEvent::new(
                "governance.policy_violation",
                "governance_engine",
                "agent",
            ))
            .await;
        assert_eq!(report.delivered_count(), 1);
        assert_eq!(runtime.ledger().len(), 1);

        let maintenance = runtime.maintenance();
        assert!(maintenance.integrity.valid);
        assert!(maintenance.gaps.is_empty());

        let shutdown = runtime.shutdown().await;
        assert!(shutdown.drained);
    }

    #[tokio::test]
    async fn test_reload_binds_handler_for_new_subscriber() {
        let routes = routes_file(ROUTES);
        let runtime = runtime(&routes);
        runtime.start().unwrap();

        std::fs::write(
            routes.path(),
            "events:\n  - event_type: governance.policy_violation\n    publishers: [governance_engine]\n    subscribers: [pager]\n",
        )
        .unwrap();
        assert_eq!(runtime.reload().unwrap(), 2);
        assert!(runtime
            .dispatcher()
            .has_component_handler(&"pager".into()));

        let report = runtime
            .dispatcher()
            .emit(TriggerEvent::new(
                "governance.policy_violation",
                "governance_engine",
                "agent",
            ))
            .await;
        assert_eq!(report.delivered_count(), 1);
        assert_eq!(report.targets[0].target.as_str(), "pager");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_reload_keeps_map() {
        let routes = routes_file(ROUTES);
        let runtime = runtime(&routes);
        runtime.start().unwrap();

        std::fs::write(
            routes.path(),
            "events: []\nsubscriber_groups:\n  ops: [ghost]\n",
        )
        .unwrap();
        assert!(runtime.reload().is_err());
        assert_eq!(runtime.dispatcher().routing().version(), 1);

        runtime.shutdown().await;
    }
}
