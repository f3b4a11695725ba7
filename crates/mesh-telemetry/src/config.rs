//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for mesh logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Deployment environment label (dev, staging, prod)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "event-mesh".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            environment: "dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MESH_SERVICE_NAME`: Service name (default: event-mesh)
    /// - `MESH_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `MESH_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `MESH_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `MESH_ENVIRONMENT`: Environment label (default: dev)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("MESH_SERVICE_NAME")
                .unwrap_or_else(|_| "event-mesh".to_string()),

            log_level: env::var("MESH_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("MESH_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("MESH_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            environment: env::var("MESH_ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
        }
    }

    /// Service name qualified with the environment, e.g. `event-mesh-prod`.
    pub fn full_service_name(&self) -> String {
        if self.environment == "dev" {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.environment)
        }
    }
}
