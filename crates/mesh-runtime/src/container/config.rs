//! # Node Configuration
//!
//! Unified runtime configuration for the mesh node, read from `MESH_*`
//! environment variables. Every value has a default; malformed numbers
//! fall back to the default rather than aborting startup.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mesh_02_audit_log::{AuditConfig, HeartbeatPolicy};
use mesh_03_dispatcher::DispatcherConfig;
use mesh_telemetry::TelemetryConfig;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Route catalogue file (YAML or JSON).
    pub routes_path: PathBuf,
    pub ledger: LedgerConfig,
    pub dispatcher: DispatcherConfig,
    pub telemetry: TelemetryConfig,
    /// Period of the integrity + gap check.
    pub maintenance_interval: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            routes_path: PathBuf::from("./config/routes.yaml"),
            ledger: LedgerConfig::default(),
            dispatcher: DispatcherConfig::default(),
            telemetry: TelemetryConfig::default(),
            maintenance_interval: Duration::from_secs(60),
        }
    }
}

/// Audit ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-lines ledger file; `None` keeps the ledger in memory.
    pub path: Option<PathBuf>,
    /// fsync after every append.
    pub fsync: bool,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub lock_timeout: Duration,
    /// Raw `subsystem=secs,...` heartbeat list.
    pub heartbeats: String,
    pub heartbeat_multiplier: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            fsync: true,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            lock_timeout: Duration::from_millis(1000),
            heartbeats: String::new(),
            heartbeat_multiplier: HeartbeatPolicy::DEFAULT_MULTIPLIER,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    /// `MESH_HEARTBEATS` could not be parsed.
    #[error("Invalid MESH_HEARTBEATS value: {0}")]
    InvalidHeartbeats(String),
}

impl LedgerConfig {
    /// Build the ledger's `AuditConfig`, parsing the heartbeat list.
    pub fn audit_config(&self) -> Result<AuditConfig, RuntimeConfigError> {
        let heartbeats = HeartbeatPolicy::parse(&self.heartbeats, self.heartbeat_multiplier)
            .map_err(|e| RuntimeConfigError::InvalidHeartbeats(e.to_string()))?;
        Ok(AuditConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_backoff(self.initial_backoff)
            .with_lock_timeout(self.lock_timeout)
            .with_heartbeats(heartbeats))
    }
}

impl MeshConfig {
    /// Load configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `MESH_ROUTES_PATH`: Route catalogue (default: ./config/routes.yaml)
    /// - `MESH_AUDIT_PATH`: Ledger file (default: in-memory)
    /// - `MESH_AUDIT_FSYNC`: fsync each append (default: true)
    /// - `MESH_AUDIT_MAX_ATTEMPTS`: Append attempts (default: 3)
    /// - `MESH_AUDIT_BACKOFF_MS`: Initial retry backoff (default: 10)
    /// - `MESH_AUDIT_LOCK_TIMEOUT_MS`: Writer lock window (default: 1000)
    /// - `MESH_HEARTBEATS`: `subsystem=secs,...` (default: empty)
    /// - `MESH_HEARTBEAT_MULTIPLIER`: Gap multiplier (default: 3)
    /// - `MESH_MAINTENANCE_INTERVAL_SECS`: Integrity check period (default: 60)
    ///
    /// Dispatcher and telemetry variables are read by their own
    /// `from_env` constructors.
    pub fn from_env() -> Self {
        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            path: env::var("MESH_AUDIT_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            fsync: env::var("MESH_AUDIT_FSYNC")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.fsync),
            max_attempts: env_parse("MESH_AUDIT_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            initial_backoff: env_parse("MESH_AUDIT_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            lock_timeout: env_parse("MESH_AUDIT_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            heartbeats: env::var("MESH_HEARTBEATS").unwrap_or_default(),
            heartbeat_multiplier: env_parse("MESH_HEARTBEAT_MULTIPLIER")
                .unwrap_or(defaults.heartbeat_multiplier),
        };

        Self {
            routes_path: env::var("MESH_ROUTES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./config/routes.yaml")),
            ledger,
            dispatcher: DispatcherConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            maintenance_interval: env_parse("MESH_MAINTENANCE_INTERVAL_SECS")
                .map(|secs: u64| Duration::from_secs(secs.max(1)))
                .unwrap_or(Duration::from_secs(60)),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
