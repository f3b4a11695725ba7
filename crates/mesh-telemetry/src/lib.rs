//! # Mesh Telemetry
//!
//! Logging and metrics for the Governed Event Mesh.
//!
//! ## Components
//!
//! - **Logs**: `tracing` with an env-filtered fmt or JSON subscriber
//! - **Metrics**: Prometheus counters, gauges and histograms in a global registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mesh_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     let _guard = init_telemetry(config).expect("Failed to init telemetry");
//!
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MESH_SERVICE_NAME` | `event-mesh` | Service name in logs |
//! | `MESH_LOG_LEVEL` | `info` | Log level filter |
//! | `MESH_JSON_LOGS` | `false` | JSON log output |
//! | `MESH_ENVIRONMENT` | `dev` | Deployment environment label |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::StructuredLogger;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, AUDIT_APPENDS,
    AUDIT_APPEND_FAILURES, AUDIT_INTEGRITY_BREAKS, AUDIT_LEDGER_LENGTH, CONFIG_RELOAD_FAILURES,
    DELIVERY_DURATION, EVENTS_BLOCKED, EVENTS_ROUTED, EVENTS_VALIDATED, LANE_DEPTH, REGISTRY,
    ROUTING_MAP_VERSION, TARGET_FAILURES, VALIDATION_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first (no subscriber needed)
    let metrics_handle = register_metrics()?;

    let logger = logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        _logger: logger,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logger: StructuredLogger,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
