//! # Governed Event Mesh Node
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `MESH_*` environment variables
//! 2. Initialize logging and metrics
//! 3. Open the audit ledger and load the route catalogue (fails fast on
//!    `ConfigError`)
//! 4. Register a handler for every catalogue component
//! 5. Start the dispatcher and the maintenance loop
//!
//! ## Signals
//!
//! | Signal | Action |
//! |--------|--------|
//! | `SIGHUP` | Reload the route catalogue; a rejected reload keeps the old map |
//! | `SIGINT` / `SIGTERM` | Graceful shutdown within `MESH_SHUTDOWN_GRACE_MS` |

use anyhow::{Context, Result};
use mesh_runtime::{MeshConfig, MeshRuntime};
use mesh_telemetry::{init_telemetry, log_mesh_event};

#[tokio::main]
async fn main() -> Result<()> {
    let config = MeshConfig::from_env();
    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("Failed to initialize telemetry")?;

    log_mesh_event!(
        info,
        "runtime",
        "Starting Governed Event Mesh node",
        service = %config.telemetry.full_service_name(),
        version = env!("CARGO_PKG_VERSION")
    );

    let runtime = MeshRuntime::new(config)?;
    runtime.start()?;

    wait_for_shutdown(&runtime).await?;

    let report = runtime.shutdown().await;
    if !report.drained {
        log_mesh_event!(
            warn,
            "runtime",
            "Shutdown grace period elapsed",
            cancelled = report.cancelled,
            aborted_workers = report.aborted_workers
        );
    }
    Ok(())
}

/// Block until Ctrl-C or SIGTERM, reloading the catalogue on every SIGHUP.
#[cfg(unix)]
async fn wait_for_shutdown(runtime: &MeshRuntime) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    log_mesh_event!(info, "runtime", "Node is running. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = hangup.recv() => {
                // Errors are logged by `reload`; the old map stays active.
                let _ = runtime.reload();
            }
            _ = terminate.recv() => {
                log_mesh_event!(info, "runtime", "SIGTERM received");
                return Ok(());
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                log_mesh_event!(info, "runtime", "Ctrl-C received");
                return Ok(());
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_runtime: &MeshRuntime) -> Result<()> {
    log_mesh_event!(info, "runtime", "Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}
