//! Logs every delivered event at `info` with its routing context.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use mesh_03_dispatcher::ComponentHandler;
use mesh_telemetry::log_mesh_event;
use shared_types::{ComponentId, HandlerError, TriggerEvent};

/// Stand-in handler for components that have no in-process implementation.
pub struct LoggingHandler {
    component: ComponentId,
    handled: AtomicU64,
}

impl LoggingHandler {
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            handled: AtomicU64::new(0),
        }
    }

    /// Events handled so far.
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ComponentHandler for LoggingHandler {
    async fn handle(&self, event: &TriggerEvent) -> Result<(), HandlerError> {
        self.handled.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| HandlerError::new(format!("payload not serializable: {e}")))?;
        log_mesh_event!(
            info,
            "runtime",
            "Event received",
            target = %self.component,
            event_id = %event.id(),
            event_type = %event.event_type,
            source = %event.source,
            actor = %event.actor,
            payload = %payload
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_events() {
        let handler = LoggingHandler::new("alert_system".into());
        let event = TriggerEvent::new("a.b", "src", "actor").with_field("k", 1);
        handler.handle(&event).await.unwrap();
        handler.handle(&event).await.unwrap();
        assert_eq!(handler.handled(), 2);
    }
}
