//! Dispatcher configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime parameters for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Worker tasks draining the lanes
    pub workers: usize,

    /// Maximum queued events per lane
    pub lane_capacity: usize,

    /// Rules with `priority_level` above this use the priority lane
    pub priority_cutoff: u32,

    /// Per-call timeout for each validator
    pub validation_timeout: Duration,

    /// Per-call timeout for each handler
    pub handler_timeout: Duration,

    /// How long `stop` waits for the lanes to drain
    pub shutdown_grace: Duration,

    /// Use the producer's `trust_score` when no TrustScorer is registered
    pub trust_fallback: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            lane_capacity: 10_000,
            priority_cutoff: 5,
            validation_timeout: Duration::from_millis(2_000),
            handler_timeout: Duration::from_millis(30_000),
            shutdown_grace: Duration::from_millis(5_000),
            trust_fallback: false,
        }
    }
}

impl DispatcherConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MESH_WORKERS`: Worker pool size (default: 4)
    /// - `MESH_LANE_CAPACITY`: Max queued events per lane (default: 10000)
    /// - `MESH_PRIORITY_CUTOFF`: Priority lane cutoff (default: 5)
    /// - `MESH_VALIDATION_TIMEOUT_MS`: Validator timeout (default: 2000)
    /// - `MESH_HANDLER_TIMEOUT_MS`: Handler timeout (default: 30000)
    /// - `MESH_SHUTDOWN_GRACE_MS`: Drain grace period (default: 5000)
    /// - `MESH_TRUST_FALLBACK`: Fall back to producer trust (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_parse("MESH_WORKERS").unwrap_or(defaults.workers).max(1),
            lane_capacity: env_parse("MESH_LANE_CAPACITY")
                .unwrap_or(defaults.lane_capacity)
                .max(1),
            priority_cutoff: env_parse("MESH_PRIORITY_CUTOFF").unwrap_or(defaults.priority_cutoff),
            validation_timeout: env_millis("MESH_VALIDATION_TIMEOUT_MS")
                .unwrap_or(defaults.validation_timeout),
            handler_timeout: env_millis("MESH_HANDLER_TIMEOUT_MS")
                .unwrap_or(defaults.handler_timeout),
            shutdown_grace: env_millis("MESH_SHUTDOWN_GRACE_MS").unwrap_or(defaults.shutdown_grace),
            trust_fallback: env::var("MESH_TRUST_FALLBACK")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.trust_fallback),
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_lane_capacity(mut self, capacity: usize) -> Self {
        self.lane_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_priority_cutoff(mut self, cutoff: u32) -> Self {
        self.priority_cutoff = cutoff;
        self
    }

    #[must_use]
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_trust_fallback(mut self, enabled: bool) -> Self {
        self.trust_fallback = enabled;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
