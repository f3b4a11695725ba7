//! Shared fixtures: catalogue files, a recording handler and a fully wired
//! in-memory mesh.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mesh_02_audit_log::{
    AuditConfig, AuditFilter, ImmutableAuditLog, ImmutableLogEntry, InMemoryLedgerStore,
};
use mesh_03_dispatcher::{ComponentHandler, DispatcherConfig, EventDispatcher};
use parking_lot::Mutex;
use shared_types::{ComponentId, EventId, HandlerError, TriggerEvent};
use tempfile::NamedTempFile;

/// The governance catalogue most scenarios run against.
pub const GOVERNANCE_ROUTES: &str = r#"
components: [archive]
events:
  - event_type: governance.policy_violation
    description: A constitutional policy was violated
    publishers: [governance_engine]
    subscribers: [alert_system, immutable_log]
    min_trust_score: 0.9
    audit_required: true
  - event_type: chat.message
    publishers: [chat]
    subscribers: [archive]
  - event_type: incident.raised
    publishers: [monitoring]
    subscribers: [archive]
routing_rules:
  priority_events: [incident.raised]
  audit_events: []
  alert_events: [governance.policy_violation]
subscriber_groups:
  responders: [alert_system, archive]
"#;

/// Write `body` to a temporary `.yaml` file.
pub fn catalogue_file(body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create catalogue file");
    file.write_all(body.as_bytes()).expect("write catalogue");
    file
}

/// Replace the contents of a catalogue file in place.
pub fn rewrite(path: &Path, body: &str) {
    std::fs::write(path, body).expect("rewrite catalogue");
}

// =============================================================================
// RECORDING HANDLER
// =============================================================================

/// One handler invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub target: ComponentId,
    pub event_id: EventId,
    pub event_type: String,
    pub at: Instant,
}

/// Records every invocation across all the handlers it hands out.
#[derive(Default)]
pub struct Recorder {
    invocations: Mutex<Vec<Invocation>>,
    delay: Option<Duration>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handlers sleep for `delay` after recording.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            invocations: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    pub fn handler(self: &Arc<Self>, target: impl Into<ComponentId>) -> Arc<dyn ComponentHandler> {
        Arc::new(RecordingHandler {
            recorder: Arc::clone(self),
            target: target.into(),
        })
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn targets_for(&self, event_id: EventId) -> Vec<ComponentId> {
        self.invocations
            .lock()
            .iter()
            .filter(|i| i.event_id == event_id)
            .map(|i| i.target.clone())
            .collect()
    }
}

struct RecordingHandler {
    recorder: Arc<Recorder>,
    target: ComponentId,
}

#[async_trait]
impl ComponentHandler for RecordingHandler {
    async fn handle(&self, event: &TriggerEvent) -> Result<(), HandlerError> {
        self.recorder.invocations.lock().push(Invocation {
            target: self.target.clone(),
            event_id: event.id(),
            event_type: event.event_type.clone(),
            at: Instant::now(),
        });
        if let Some(delay) = self.recorder.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

// =============================================================================
// WIRED MESH
// =============================================================================

/// Dispatcher + in-memory ledger + recorder bound to every catalogue component.
pub struct TestMesh {
    pub dispatcher: EventDispatcher,
    pub ledger: Arc<ImmutableAuditLog<InMemoryLedgerStore>>,
    pub recorder: Arc<Recorder>,
    pub routes: NamedTempFile,
}

impl TestMesh {
    /// Build a mesh over `routes`. The dispatcher is not started.
    pub fn new(routes: &str, config: DispatcherConfig) -> Self {
        Self::with_recorder(routes, config, Recorder::new())
    }

    pub fn with_recorder(routes: &str, config: DispatcherConfig, recorder: Arc<Recorder>) -> Self {
        let routes = catalogue_file(routes);
        let ledger = Arc::new(ImmutableAuditLog::new_in_memory(AuditConfig::default()));
        let dispatcher = EventDispatcher::new(config, ledger.clone());
        dispatcher
            .load_config(routes.path())
            .expect("load catalogue");

        for component in dispatcher.routing().current().components() {
            dispatcher.register_component_handler(component.clone(), recorder.handler(component.clone()));
        }

        Self {
            dispatcher,
            ledger,
            recorder,
            routes,
        }
    }

    /// Build and start.
    pub fn running(routes: &str, config: DispatcherConfig) -> Self {
        let mesh = Self::new(routes, config);
        mesh.dispatcher.start().expect("start dispatcher");
        mesh
    }

    pub fn audit_entries(&self) -> Vec<ImmutableLogEntry> {
        self.ledger.get_entries(&AuditFilter::default(), usize::MAX)
    }
}
