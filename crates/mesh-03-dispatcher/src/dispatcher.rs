//! # Event Dispatcher
//!
//! The validation gate and delivery engine.
//!
//! ## Flow
//!
//! ```text
//! submit(event)
//!   ├─ resolve route (exact rules, then pattern rules + subscriptions)
//!   ├─ nothing matched, no requires_validation ──► Unrouted
//!   ├─ validation gate ──► Blocked (audit "event.blocked", alert)
//!   └─ push to priority/normal lane ──► DeliveryTicket
//!
//! worker
//!   ├─ pop (priority lane first)
//!   ├─ invoke every target concurrently, isolating failures
//!   └─ audit "event.routed" when the rule or event asks for it
//! ```
//!
//! The route is resolved once at submission. A reload between submission
//! and delivery does not change the targets or policy of a queued event.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::FutureExt;
use mesh_01_routing_config::{ConfigError, ResolvedRoute, RoutingTable};
use mesh_02_audit_log::{AuditLogApi, AuditOutcome, AuditRecord, IntegrityReport};
use mesh_telemetry::{
    log_mesh_event, metric_inc, HistogramTimer, DELIVERY_DURATION, EVENTS_BLOCKED, EVENTS_ROUTED,
    EVENTS_VALIDATED, TARGET_FAILURES, VALIDATION_DURATION,
};
use parking_lot::Mutex;
use serde_json::json;
use shared_types::{ComponentId, EventId, EventPattern, TriggerEvent};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::alerts::{Alert, AlertHook, AlertSlot};
use crate::config::DispatcherConfig;
use crate::errors::DispatchError;
use crate::handler::{ComponentHandler, HandlerRegistry, Subscription, SubscriptionId};
use crate::lanes::Lanes;
use crate::report::{
    BlockReason, DeliveryReport, DeliveryStatus, Lane, RejectReason, TargetOutcome, TargetReport,
};
use crate::stats::{DispatchStats, StatsSnapshot};
use crate::validators::{ConstitutionalValidator, GateDecision, TrustScorer, ValidationGate};

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Dispatcher lifecycle: `Created → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepts submissions and buffers them until `start`.
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Result of `stop`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers finished every queued event within the grace period.
    pub drained: bool,
    /// Queued events resolved as `Rejected(cancelled)`.
    pub cancelled: usize,
    /// Workers aborted after the grace period.
    pub aborted_workers: usize,
}

// =============================================================================
// SUBMISSION
// =============================================================================

/// What `submit` produced.
pub enum Submission {
    /// Resolved without delivery: blocked, unrouted or rejected.
    Settled(DeliveryReport),
    /// Approved and queued on a lane.
    Enqueued(DeliveryTicket),
}

impl Submission {
    /// Wait for the final report.
    pub async fn wait(self) -> DeliveryReport {
        match self {
            Submission::Settled(report) => report,
            Submission::Enqueued(ticket) => ticket.wait().await,
        }
    }

    pub fn is_enqueued(&self) -> bool {
        matches!(self, Submission::Enqueued(_))
    }
}

/// Claim on the delivery report of a queued event.
pub struct DeliveryTicket {
    receiver: oneshot::Receiver<DeliveryReport>,
    cancelled: DeliveryReport,
}

impl DeliveryTicket {
    pub fn event_id(&self) -> EventId {
        self.cancelled.event_id
    }

    pub fn lane(&self) -> Option<Lane> {
        self.cancelled.lane
    }

    /// Resolves to `Rejected(cancelled)` when the event was dropped by
    /// shutdown before a worker reported on it.
    pub async fn wait(self) -> DeliveryReport {
        let DeliveryTicket {
            receiver,
            cancelled,
        } = self;
        receiver.await.unwrap_or(cancelled)
    }
}

struct Job {
    event: TriggerEvent,
    route: ResolvedRoute,
    subscriptions: Vec<Subscription>,
    reply: oneshot::Sender<DeliveryReport>,
}

// =============================================================================
// DISPATCHER
// =============================================================================

struct Inner {
    config: DispatcherConfig,
    routing: Arc<RoutingTable>,
    handlers: HandlerRegistry,
    gate: ValidationGate,
    alerts: AlertSlot,
    audit: Arc<dyn AuditLogApi>,
    lanes: Lanes<Job>,
    stats: DispatchStats,
    state: Mutex<DispatcherState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Policy-gated event dispatcher.
///
/// Cheap to clone; clones share the same lanes, handlers and counters.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl EventDispatcher {
    /// Create a dispatcher with its own empty routing table.
    pub fn new(config: DispatcherConfig, audit: Arc<dyn AuditLogApi>) -> Self {
        Self::with_routing(config, Arc::new(RoutingTable::new()), audit)
    }

    /// Create a dispatcher over an existing routing table.
    pub fn with_routing(
        config: DispatcherConfig,
        routing: Arc<RoutingTable>,
        audit: Arc<dyn AuditLogApi>,
    ) -> Self {
        let gate = ValidationGate::new(config.validation_timeout, config.trust_fallback);
        let lanes = Lanes::new(config.lane_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                routing,
                handlers: HandlerRegistry::default(),
                gate,
                alerts: AlertSlot::default(),
                audit,
                lanes,
                stats: DispatchStats::default(),
                state: Mutex::new(DispatcherState::Created),
                workers: Mutex::new(Vec::new()),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Load the initial route catalogue.
    pub fn load_config(&self, path: impl AsRef<Path>) -> Result<u64, DispatchError> {
        Ok(self.inner.routing.load(path)?)
    }

    /// Replace the active routing map. On error the previous map stays active.
    pub fn reload_config(&self, path: impl AsRef<Path>) -> Result<u64, ConfigError> {
        self.inner.routing.reload(path)
    }

    pub fn routing(&self) -> &Arc<RoutingTable> {
        &self.inner.routing
    }

    pub fn audit(&self) -> &Arc<dyn AuditLogApi> {
        &self.inner.audit
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    // -------------------------------------------------------------------------
    // Handlers and validators
    // -------------------------------------------------------------------------

    /// Bind the handler invoked for `component` when it is a route target.
    pub fn register_component_handler(
        &self,
        component: impl Into<ComponentId>,
        handler: Arc<dyn ComponentHandler>,
    ) {
        let component = component.into();
        if self.inner.handlers.register(component.clone(), handler) {
            log_mesh_event!(info, "dispatcher", "Replaced component handler", target = %component);
        }
    }

    pub fn has_component_handler(&self, component: &ComponentId) -> bool {
        self.inner.handlers.component(component).is_some()
    }

    pub fn unregister_component_handler(&self, component: &ComponentId) -> bool {
        self.inner.handlers.unregister(component)
    }

    /// Receive every event whose type matches `pattern`, in addition to the
    /// catalogue targets. Subscriptions carry no policy metadata.
    pub fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn ComponentHandler>,
    ) -> Result<SubscriptionId, DispatchError> {
        let pattern = EventPattern::parse(pattern)?;
        Ok(self.inner.handlers.subscribe(pattern, handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.handlers.unsubscribe(id)
    }

    /// Install or clear (`None`) the constitutional validator.
    pub fn set_governance_validator(
        &self,
        validator: impl Into<Option<Arc<dyn ConstitutionalValidator>>>,
    ) {
        self.inner.gate.set_constitutional(validator.into());
    }

    /// Install or clear (`None`) the trust scorer.
    pub fn set_trust_scorer(&self, scorer: impl Into<Option<Arc<dyn TrustScorer>>>) {
        self.inner.gate.set_trust_scorer(scorer.into());
    }

    pub fn set_alert_hook(&self, hook: impl Into<Option<Arc<dyn AlertHook>>>) {
        self.inner.alerts.set(hook.into());
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn state(&self) -> DispatcherState {
        *self.inner.state.lock()
    }

    /// Spawn the worker pool on the current Tokio runtime.
    ///
    /// ## Errors
    ///
    /// - `AlreadyStarted` / `Stopped`: wrong lifecycle state
    /// - `ConfigNotLoaded`: no catalogue installed yet
    /// - `NoRuntime`: called outside a Tokio runtime
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut state = self.inner.state.lock();
        match *state {
            DispatcherState::Created => {}
            DispatcherState::Running => return Err(DispatchError::AlreadyStarted),
            DispatcherState::Stopping | DispatcherState::Stopped => {
                return Err(DispatchError::Stopped)
            }
        }
        if !self.inner.routing.is_loaded() {
            return Err(DispatchError::ConfigNotLoaded);
        }
        let runtime = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;

        let mut workers = self.inner.workers.lock();
        for worker in 0..self.inner.config.workers {
            workers.push(runtime.spawn(run_worker(Arc::clone(&self.inner), worker)));
        }
        *state = DispatcherState::Running;

        let (priority, normal) = self.inner.lanes.depths();
        log_mesh_event!(
            info,
            "dispatcher",
            "Dispatcher started",
            workers = self.inner.config.workers,
            buffered_priority = priority,
            buffered_normal = normal,
            map_version = self.inner.routing.version()
        );
        Ok(())
    }

    /// Stop with the configured grace period.
    pub async fn stop(&self) -> ShutdownReport {
        self.stop_with_grace(self.inner.config.shutdown_grace).await
    }

    /// Refuse new events, let workers drain the lanes for up to `grace`, then
    /// abort them and cancel whatever is still queued.
    pub async fn stop_with_grace(&self, grace: Duration) -> ShutdownReport {
        {
            let mut state = self.inner.state.lock();
            match *state {
                DispatcherState::Stopping | DispatcherState::Stopped => {
                    return ShutdownReport {
                        drained: true,
                        ..Default::default()
                    }
                }
                DispatcherState::Created | DispatcherState::Running => {
                    *state = DispatcherState::Stopping;
                }
            }
        }
        self.inner.lanes.close();

        let mut workers = std::mem::take(&mut *self.inner.workers.lock());
        let drained = tokio::time::timeout(grace, join_all(workers.iter_mut()))
            .await
            .is_ok();
        let aborted_workers = if drained {
            0
        } else {
            for worker in &workers {
                worker.abort();
            }
            workers.len()
        };

        let leftover = self.inner.lanes.drain();
        let cancelled = leftover.len();
        for job in leftover {
            self.inner.stats.record_rejected();
            let report = DeliveryReport::settled(
                &job.event,
                DeliveryStatus::Rejected {
                    reason: RejectReason::Cancelled,
                },
                job.route.map_version,
            );
            let _ = job.reply.send(report);
        }

        *self.inner.state.lock() = DispatcherState::Stopped;
        log_mesh_event!(
            info,
            "dispatcher",
            "Dispatcher stopped",
            drained = drained,
            cancelled = cancelled,
            aborted_workers = aborted_workers
        );
        ShutdownReport {
            drained,
            cancelled,
            aborted_workers,
        }
    }

    // -------------------------------------------------------------------------
    // Emission
    // -------------------------------------------------------------------------

    /// Route, validate and deliver one event, returning its final report.
    pub async fn emit(&self, event: TriggerEvent) -> DeliveryReport {
        self.submit(event).await.wait().await
    }

    /// Route and validate one event. Approved events are queued and the
    /// returned ticket resolves once a worker has delivered them.
    pub async fn submit(&self, event: TriggerEvent) -> Submission {
        let inner = &self.inner;
        inner.stats.record_emitted();

        if matches!(
            *inner.state.lock(),
            DispatcherState::Stopping | DispatcherState::Stopped
        ) {
            return Submission::Settled(inner.reject(
                &event,
                RejectReason::ShuttingDown,
                inner.routing.version(),
            ));
        }

        let map = inner.routing.current();
        let route = map.resolve(&event.source, &event.event_type);
        let subscriptions = inner.handlers.matching(&event.event_type);
        let has_targets = !route.targets.is_empty() || !subscriptions.is_empty();

        if !has_targets && !event.requires_validation {
            return Submission::Settled(inner.unrouted(&event, &route));
        }

        let decision = {
            let _timer = HistogramTimer::new(&VALIDATION_DURATION);
            inner.gate.evaluate(&event, &route).await
        };
        match decision {
            GateDecision::Blocked(reason) => {
                return Submission::Settled(inner.block(&event, &route, reason).await);
            }
            GateDecision::Approved { validated: true } => {
                inner.stats.record_validated();
                metric_inc!(EVENTS_VALIDATED);
            }
            GateDecision::Approved { validated: false } => {}
        }

        if !has_targets {
            return Submission::Settled(inner.unrouted(&event, &route));
        }

        let lane = if route.is_priority(inner.config.priority_cutoff) {
            Lane::Priority
        } else {
            Lane::Normal
        };
        let map_version = route.map_version;
        let mut cancelled = DeliveryReport::settled(
            &event,
            DeliveryStatus::Rejected {
                reason: RejectReason::Cancelled,
            },
            map_version,
        );
        cancelled.lane = Some(lane);

        let (reply, receiver) = oneshot::channel();
        let job = Job {
            event,
            route,
            subscriptions,
            reply,
        };
        match inner.lanes.push(lane, job) {
            Ok(()) => Submission::Enqueued(DeliveryTicket {
                receiver,
                cancelled,
            }),
            Err((job, reason)) => {
                Submission::Settled(inner.reject(&job.event, reason, map_version))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Observability
    // -------------------------------------------------------------------------

    pub fn get_stats(&self) -> StatsSnapshot {
        self.inner
            .stats
            .snapshot(self.inner.lanes.depths(), self.inner.routing.version())
    }

    /// Verify the audit chain, raising `IntegrityViolation` on a break.
    pub fn verify_audit_integrity(&self) -> IntegrityReport {
        let report = self.inner.audit.verify_integrity();
        if !report.valid {
            self.inner.alerts.raise(Alert::IntegrityViolation {
                broken_at: report.broken_at,
                entries_verified: report.entries_verified,
            });
        }
        report
    }
}

async fn run_worker(inner: Arc<Inner>, worker: usize) {
    log_mesh_event!(debug, "dispatcher", "Worker started", worker = worker);
    while let Some((lane, job)) = inner.lanes.next().await {
        let report = inner.deliver(lane, &job).await;
        // The submitter may have dropped its ticket.
        let _ = job.reply.send(report);
    }
    log_mesh_event!(debug, "dispatcher", "Worker exiting", worker = worker);
}

impl Inner {
    fn reject(&self, event: &TriggerEvent, reason: RejectReason, map_version: u64) -> DeliveryReport {
        self.stats.record_rejected();
        log_mesh_event!(
            warn,
            "dispatcher",
            "Event rejected",
            event_id = %event.id(),
            event_type = %event.event_type,
            reason = reason.as_str()
        );
        DeliveryReport::settled(event, DeliveryStatus::Rejected { reason }, map_version)
    }

    fn unrouted(&self, event: &TriggerEvent, route: &ResolvedRoute) -> DeliveryReport {
        self.stats.record_unrouted();
        log_mesh_event!(
            debug,
            "dispatcher",
            "No route for event",
            event_id = %event.id(),
            event_type = %event.event_type,
            source = %event.source
        );
        DeliveryReport::settled(event, DeliveryStatus::Unrouted, route.map_version)
    }

    async fn block(
        &self,
        event: &TriggerEvent,
        route: &ResolvedRoute,
        reason: BlockReason,
    ) -> DeliveryReport {
        self.stats.record_blocked(&reason);
        metric_inc!(EVENTS_BLOCKED, &[reason.as_str()]);
        log_mesh_event!(
            warn,
            "dispatcher",
            "Event blocked by validation gate",
            event_id = %event.id(),
            event_type = %event.event_type,
            source = %event.source,
            reason = reason.as_str()
        );

        let record = audit_record(event, "event.blocked")
            .with_payload(json!({
                "event_id": event.id(),
                "event_type": event.event_type,
                "source": event.source,
                "reason": reason,
                "rules": route.rule_ids,
                "map_version": route.map_version,
            }))
            .with_outcome(AuditOutcome::Blocked);
        let audit_sequence = self.record_audit(event, record).await;

        if route.alert_on_failure {
            self.alerts.raise(Alert::Blocked {
                event_id: event.id(),
                event_type: event.event_type.clone(),
                source: event.source.clone(),
                reason: reason.clone(),
            });
        }

        let mut report =
            DeliveryReport::settled(event, DeliveryStatus::Blocked(reason), route.map_version);
        report.audit_sequence = audit_sequence;
        report
    }

    async fn deliver(&self, lane: Lane, job: &Job) -> DeliveryReport {
        let _timer = HistogramTimer::new(&DELIVERY_DURATION);
        let event = &job.event;
        let route = &job.route;

        let mut calls = Vec::with_capacity(route.targets.len() + job.subscriptions.len());
        for target in &route.targets {
            let handler = self.handlers.component(target);
            calls.push(self.invoke(target.clone(), handler, event));
        }
        for subscription in &job.subscriptions {
            calls.push(self.invoke(
                subscription.id.target(),
                Some(Arc::clone(&subscription.handler)),
                event,
            ));
        }
        let targets = join_all(calls).await;

        let mut failed = Vec::new();
        for report in targets.iter().filter(|t| !t.outcome.is_success()) {
            self.stats.record_target_failure(&report.target);
            metric_inc!(TARGET_FAILURES, &[report.target.as_str()]);
            log_mesh_event!(
                warn,
                "dispatcher",
                "Target failed to handle event",
                event_id = %event.id(),
                target = %report.target,
                outcome = ?report.outcome
            );
            failed.push(report.target.clone());
        }

        self.stats.record_routed();
        metric_inc!(EVENTS_ROUTED);
        let status = if failed.is_empty() {
            DeliveryStatus::Delivered
        } else {
            self.stats.record_partial_failure();
            if route.alert_on_failure {
                self.alerts.raise(Alert::DeliveryFailure {
                    event_id: event.id(),
                    event_type: event.event_type.clone(),
                    failed_targets: failed.clone(),
                });
            }
            DeliveryStatus::PartialFailure
        };

        let audit_sequence = if route.audit_required || event.requires_validation {
            let outcome = if failed.is_empty() {
                AuditOutcome::Success
            } else {
                AuditOutcome::PartialFailure
            };
            let record = audit_record(event, "event.routed")
                .with_payload(json!({
                    "event_id": event.id(),
                    "event_type": event.event_type,
                    "source": event.source,
                    "lane": lane.as_str(),
                    "targets": targets,
                    "rules": route.rule_ids,
                    "map_version": route.map_version,
                }))
                .with_outcome(outcome);
            self.record_audit(event, record).await
        } else {
            None
        };

        log_mesh_event!(
            debug,
            "dispatcher",
            "Event delivered",
            event_id = %event.id(),
            event_type = %event.event_type,
            lane = lane.as_str(),
            targets = targets.len(),
            failed = failed.len()
        );

        DeliveryReport {
            event_id: event.id(),
            event_type: event.event_type.clone(),
            source: event.source.clone(),
            status,
            targets,
            lane: Some(lane),
            audit_sequence,
            map_version: route.map_version,
        }
    }

    async fn invoke(
        &self,
        target: ComponentId,
        handler: Option<Arc<dyn ComponentHandler>>,
        event: &TriggerEvent,
    ) -> TargetReport {
        let started = Instant::now();
        let outcome = match handler {
            None => TargetOutcome::NoHandler,
            Some(handler) => {
                let call = AssertUnwindSafe(handler.handle(event)).catch_unwind();
                match tokio::time::timeout(self.config.handler_timeout, call).await {
                    Ok(Ok(Ok(()))) => TargetOutcome::Delivered,
                    Ok(Ok(Err(err))) => TargetOutcome::Failed(err.message),
                    Ok(Err(panic)) => TargetOutcome::Panicked(panic_message(&*panic)),
                    Err(_) => TargetOutcome::TimedOut,
                }
            }
        };
        TargetReport {
            target,
            outcome,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Append to the ledger. Failures are counted, logged and alerted, never
    /// returned.
    async fn record_audit(&self, event: &TriggerEvent, record: AuditRecord) -> Option<u64> {
        match self.audit.append(record).await {
            Ok(sequence) => Some(sequence),
            Err(err) => {
                self.stats.record_audit_failure();
                log_mesh_event!(
                    error,
                    "dispatcher",
                    "Audit write failed, continuing without audit entry",
                    event_id = %event.id(),
                    error = %err
                );
                self.alerts.raise(Alert::AuditWriteFailure {
                    event_id: event.id(),
                    error: err.to_string(),
                });
                None
            }
        }
    }
}

fn audit_record(event: &TriggerEvent, action: &str) -> AuditRecord {
    let resource = event
        .resource
        .clone()
        .unwrap_or_else(|| event.id().to_string());
    AuditRecord::new(event.actor.clone(), action, resource, event.source.as_str())
        .with_correlation_id(event.correlation())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
