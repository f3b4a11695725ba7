//! # Mesh Container
//!
//! Builds the node's components in dependency order:
//!
//! 1. Audit ledger (file-backed or in-memory)
//! 2. Dispatcher over the ledger
//! 3. Route catalogue
//! 4. A logging handler for every catalogue component
//!
//! After a reload, [`bind_logging_handlers`] covers components the new
//! catalogue introduced.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use mesh_02_audit_log::{AuditLogApi, ImmutableAuditLog, JsonLinesLedgerStore};
use mesh_03_dispatcher::EventDispatcher;
use mesh_telemetry::log_mesh_event;

pub use config::{LedgerConfig, MeshConfig, RuntimeConfigError};

use crate::handlers::LoggingHandler;

/// Initialized node components.
pub struct MeshContainer {
    pub config: MeshConfig,
    pub ledger: Arc<dyn AuditLogApi>,
    pub dispatcher: EventDispatcher,
}

impl MeshContainer {
    /// Build every component. Fails on an unreadable ledger or an invalid
    /// route catalogue.
    pub fn build(config: MeshConfig) -> Result<Self> {
        let ledger = open_ledger(&config.ledger)?;
        let dispatcher = EventDispatcher::new(config.dispatcher.clone(), Arc::clone(&ledger));

        let version = dispatcher.load_config(&config.routes_path).with_context(|| {
            format!(
                "Failed to load route catalogue {}",
                config.routes_path.display()
            )
        })?;

        bind_logging_handlers(&dispatcher);
        let map = dispatcher.routing().current();

        log_mesh_event!(
            info,
            "runtime",
            "Mesh container built",
            map_version = version,
            rules = map.rule_count(),
            components = map.components().len(),
            ledger_entries = ledger.len()
        );

        Ok(Self {
            config,
            ledger,
            dispatcher,
        })
    }
}

/// Register a `LoggingHandler` for every component of the active map that
/// has no handler yet. Returns how many were added.
pub fn bind_logging_handlers(dispatcher: &EventDispatcher) -> usize {
    let map = dispatcher.routing().current();
    let mut bound = 0;
    for component in map
        .components()
        .iter()
        .filter(|c| !dispatcher.has_component_handler(c))
    {
        dispatcher.register_component_handler(
            component.clone(),
            Arc::new(LoggingHandler::new(component.clone())),
        );
        bound += 1;
    }
    bound
}

fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn AuditLogApi>> {
    let audit_config = config.audit_config()?;
    match &config.path {
        Some(path) => {
            let store = JsonLinesLedgerStore::open(path, config.fsync)
                .with_context(|| format!("Failed to open audit ledger {}", path.display()))?;
            let ledger = ImmutableAuditLog::open(store, audit_config)
                .context("Failed to restore audit ledger")?;
            log_mesh_event!(info, "runtime", "Using file ledger", path = %path.display());
            Ok(Arc::new(ledger))
        }
        None => {
            log_mesh_event!(
                warn,
                "runtime",
                "MESH_AUDIT_PATH not set, audit ledger is in-memory only"
            );
            Ok(Arc::new(ImmutableAuditLog::new_in_memory(audit_config)))
        }
    }
}
