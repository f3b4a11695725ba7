//! # Dispatcher / Validation Gate (mesh-03)
//!
//! Routes `TriggerEvent`s to component handlers under governance policy.
//!
//! ## Pipeline
//!
//! ```text
//! emit ─→ resolve ─→ ValidationGate ─┬─ blocked ─→ audit + alert ─→ report
//!                                    └─ approved ─→ Lanes ─→ workers ─→ handlers
//!                                                                  └─→ audit
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | Blocked events reach no handler | gate runs before enqueue |
//! | Every block is audited | `event.blocked` entry regardless of `audit_required` |
//! | Priority before normal | workers pop the priority lane first |
//! | Handler failures are isolated | per-target timeout + panic capture |
//! | Audit failures never fail delivery | counted, logged, alerted |
//! | Reload never disturbs queued events | route resolved once at submission |
//!
//! ## Usage
//!
//! ```rust,ignore
//! let ledger = Arc::new(ImmutableAuditLog::new_in_memory(AuditConfig::default()));
//! let dispatcher = EventDispatcher::new(DispatcherConfig::from_env(), ledger);
//! dispatcher.load_config("config/routes.yaml")?;
//! dispatcher.register_component_handler("alert_system", handler_fn(|event| async move {
//!     println!("{}", event.event_type);
//!     Ok(())
//! }));
//! dispatcher.start()?;
//! let report = dispatcher.emit(event).await;
//! ```

pub mod alerts;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod handler;
mod lanes;
pub mod report;
mod stats;
pub mod validators;

pub use alerts::{Alert, AlertHook};
pub use config::DispatcherConfig;
pub use dispatcher::{
    DeliveryTicket, DispatcherState, EventDispatcher, ShutdownReport, Submission,
};
pub use errors::DispatchError;
pub use handler::{handler_fn, ComponentHandler, FnHandler, SubscriptionId};
pub use report::{
    BlockReason, DeliveryReport, DeliveryStatus, Lane, RejectReason, TargetOutcome, TargetReport,
    ValidationCheck,
};
pub use stats::StatsSnapshot;
pub use validators::{
    trust_scorer_fn, validator_fn, ConstitutionalValidator, FnTrustScorer, FnValidator,
    GateDecision, TrustScorer,
};
