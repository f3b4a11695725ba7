//! # Routing Table
//!
//! Holds the active `RoutingMap` behind an atomically swapped pointer.
//! Readers take a snapshot with [`RoutingTable::current`] and never block;
//! a reload compiles a complete new map before publishing it, so a failed
//! reload leaves the active map untouched.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use mesh_telemetry::{log_mesh_event, metric_inc, CONFIG_RELOAD_FAILURES, ROUTING_MAP_VERSION};

use crate::errors::ConfigError;
use crate::loader;
use crate::map::RoutingMap;

/// Atomically swapped holder of the active routing map.
pub struct RoutingTable {
    active: ArcSwap<RoutingMap>,
    versions: AtomicU64,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingTable {
    /// A table holding the empty map (version 0).
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: ArcSwap::from_pointee(RoutingMap::empty()),
            versions: AtomicU64::new(0),
        }
    }

    /// Snapshot of the active map.
    pub fn current(&self) -> Arc<RoutingMap> {
        self.active.load_full()
    }

    /// Version of the active map; 0 until a catalogue is installed.
    pub fn version(&self) -> u64 {
        self.active.load().version()
    }

    pub fn is_loaded(&self) -> bool {
        self.version() > 0
    }

    /// Load a catalogue at startup.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<u64, ConfigError> {
        let map = loader::load(path.as_ref())?;
        Ok(self.install(map))
    }

    /// Replace the active map from a catalogue file, all or nothing.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<u64, ConfigError> {
        let path = path.as_ref();
        match loader::load(path) {
            Ok(map) => Ok(self.install(map)),
            Err(err) => {
                metric_inc!(CONFIG_RELOAD_FAILURES);
                log_mesh_event!(
                    warn,
                    "config",
                    "Routing reload rejected, keeping active map",
                    path = %path.display(),
                    active_version = self.version(),
                    error = %err
                );
                Err(err)
            }
        }
    }

    /// Publish a compiled map, assigning it the next version.
    pub fn install(&self, map: RoutingMap) -> u64 {
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let map = map.with_version(version);
        let rules = map.rule_count();
        self.active.store(Arc::new(map));

        ROUTING_MAP_VERSION.set(version as f64);
        log_mesh_event!(
            info,
            "config",
            "Routing map installed",
            version = version,
            rules = rules
        );
        version
    }
}
