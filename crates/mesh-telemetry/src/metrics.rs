//! Prometheus metrics for the Governed Event Mesh.
//!
//! All metrics follow the naming convention: `mesh_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., mesh_events_routed_total)
//! - **Gauge**: Value that can go up or down (e.g., mesh_lane_depth)
//! - **Histogram**: Distribution of values (e.g., mesh_validation_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCHER METRICS
    // =========================================================================

    /// Events delivered to their targets (fully or partially)
    pub static ref EVENTS_ROUTED: Counter = Counter::new(
        "mesh_events_routed_total",
        "Total number of events delivered through a lane"
    ).expect("metric creation failed");

    /// Events blocked by the validation gate
    pub static ref EVENTS_BLOCKED: CounterVec = CounterVec::new(
        Opts::new("mesh_events_blocked_total", "Events blocked by the validation gate"),
        &["reason"]  // constitutional_rejected/trust_score_too_low/validation_timeout
    ).expect("metric creation failed");

    /// Events that passed at least one validation check
    pub static ref EVENTS_VALIDATED: Counter = Counter::new(
        "mesh_events_validated_total",
        "Total number of events approved by the validation gate"
    ).expect("metric creation failed");

    /// Handler failures per delivery target
    pub static ref TARGET_FAILURES: CounterVec = CounterVec::new(
        Opts::new("mesh_target_failures_total", "Handler failures per delivery target"),
        &["target"]
    ).expect("metric creation failed");

    /// Current queue depth per lane
    pub static ref LANE_DEPTH: GaugeVec = GaugeVec::new(
        Opts::new("mesh_lane_depth", "Queued events per lane"),
        &["lane"]  // lane: priority/normal
    ).expect("metric creation failed");

    /// Validation gate duration
    pub static ref VALIDATION_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "mesh_validation_duration_seconds",
            "Time spent in the validation gate"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).unwrap())
    ).expect("metric creation failed");

    /// Delivery duration (all targets of one event)
    pub static ref DELIVERY_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "mesh_delivery_duration_seconds",
            "Time spent delivering one event to all of its targets"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // ROUTING CONFIG METRICS
    // =========================================================================

    /// Version of the active routing map
    pub static ref ROUTING_MAP_VERSION: Gauge = Gauge::new(
        "mesh_routing_map_version",
        "Version of the currently active routing map"
    ).expect("metric creation failed");

    /// Rejected configuration reloads
    pub static ref CONFIG_RELOAD_FAILURES: Counter = Counter::new(
        "mesh_config_reload_failures_total",
        "Configuration reloads rejected by validation"
    ).expect("metric creation failed");

    // =========================================================================
    // AUDIT LEDGER METRICS
    // =========================================================================

    /// Entries appended to the ledger
    pub static ref AUDIT_APPENDS: Counter = Counter::new(
        "mesh_audit_appends_total",
        "Total entries appended to the audit ledger"
    ).expect("metric creation failed");

    /// Appends that failed after all retries
    pub static ref AUDIT_APPEND_FAILURES: Counter = Counter::new(
        "mesh_audit_append_failures_total",
        "Audit appends abandoned after bounded retries"
    ).expect("metric creation failed");

    /// Hash chain breaks detected by verification
    pub static ref AUDIT_INTEGRITY_BREAKS: Counter = Counter::new(
        "mesh_audit_integrity_breaks_total",
        "Integrity verifications that found a broken hash chain"
    ).expect("metric creation failed");

    /// Current ledger length
    pub static ref AUDIT_LEDGER_LENGTH: Gauge = Gauge::new(
        "mesh_audit_ledger_entries",
        "Number of entries in the audit ledger"
    ).expect("metric creation failed");
}

/// Handle for the metrics registry
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatcher
        Box::new(EVENTS_ROUTED.clone()),
        Box::new(EVENTS_BLOCKED.clone()),
        Box::new(EVENTS_VALIDATED.clone()),
        Box::new(TARGET_FAILURES.clone()),
        Box::new(LANE_DEPTH.clone()),
        Box::new(VALIDATION_DURATION.clone()),
        Box::new(DELIVERY_DURATION.clone()),
        // Routing config
        Box::new(ROUTING_MAP_VERSION.clone()),
        Box::new(CONFIG_RELOAD_FAILURES.clone()),
        // Audit ledger
        Box::new(AUDIT_APPENDS.clone()),
        Box::new(AUDIT_APPEND_FAILURES.clone()),
        Box::new(AUDIT_INTEGRITY_BREAKS.clone()),
        Box::new(AUDIT_LEDGER_LENGTH.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::HistogramTimer::new(&$histogram)
    };
}
