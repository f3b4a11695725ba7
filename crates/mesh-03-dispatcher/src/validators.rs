//! # Pluggable Validators
//!
//! Two optional capability slots injected by the host application:
//!
//! | Slot | Question | Block reason |
//! |------|----------|--------------|
//! | `ConstitutionalValidator` | May this event happen at all? | `constitutional_rejected` |
//! | `TrustScorer` | How far do we trust the event's source? | `trust_score_too_low` |
//!
//! Each call runs under the dispatcher's validation timeout; a timeout
//! blocks with `validation_timeout`. A validator that panics fails closed.
//!
//! An unset slot skips its check. The first time each rule asks for a
//! skipped check, a warning is logged so that fail-open is visible.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use mesh_01_routing_config::ResolvedRoute;
use mesh_telemetry::log_mesh_event;
use parking_lot::{Mutex, RwLock};
use shared_types::{clamp_unit, ComponentId, TriggerEvent};

use crate::report::{BlockReason, ValidationCheck};

/// Decides whether an event is constitutionally compliant.
///
/// May be slow or I/O bound. Must be safe to call concurrently.
#[async_trait]
pub trait ConstitutionalValidator: Send + Sync {
    async fn approve(&self, event: &TriggerEvent) -> bool;
}

/// Scores a component's current trustworthiness in `[0, 1]`.
#[async_trait]
pub trait TrustScorer: Send + Sync {
    async fn score(&self, component: &ComponentId) -> f64;
}

pub struct FnValidator<F>(F);

pub struct FnTrustScorer<F>(F);

/// Wrap an async closure as a `ConstitutionalValidator`.
pub fn validator_fn<F, Fut>(f: F) -> Arc<dyn ConstitutionalValidator>
where
    F: Fn(TriggerEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(FnValidator(f))
}

/// Wrap an async closure as a `TrustScorer`.
pub fn trust_scorer_fn<F, Fut>(f: F) -> Arc<dyn TrustScorer>
where
    F: Fn(ComponentId) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = f64> + Send + 'static,
{
    Arc::new(FnTrustScorer(f))
}

#[async_trait]
impl<F, Fut> ConstitutionalValidator for FnValidator<F>
where
    F: Fn(TriggerEvent) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn approve(&self, event: &TriggerEvent) -> bool {
        (self.0)(event.clone()).await
    }
}

#[async_trait]
impl<F, Fut> TrustScorer for FnTrustScorer<F>
where
    F: Fn(ComponentId) -> Fut + Send + Sync,
    Fut: Future<Output = f64> + Send,
{
    async fn score(&self, component: &ComponentId) -> f64 {
        (self.0)(component.clone()).await
    }
}

/// Outcome of the validation gate.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// `validated` is true when at least one check actually ran.
    Approved { validated: bool },
    Blocked(BlockReason),
}

/// Holds the validator slots and runs the gate.
pub(crate) struct ValidationGate {
    constitutional: RwLock<Option<Arc<dyn ConstitutionalValidator>>>,
    trust: RwLock<Option<Arc<dyn TrustScorer>>>,
    warned: Mutex<HashSet<(String, ValidationCheck)>>,
    timeout: Duration,
    trust_fallback: bool,
}

impl ValidationGate {
    pub fn new(timeout: Duration, trust_fallback: bool) -> Self {
        Self {
            constitutional: RwLock::new(None),
            trust: RwLock::new(None),
            warned: Mutex::new(HashSet::new()),
            timeout,
            trust_fallback,
        }
    }

    pub fn set_constitutional(&self, validator: Option<Arc<dyn ConstitutionalValidator>>) {
        *self.constitutional.write() = validator;
    }

    pub fn set_trust_scorer(&self, scorer: Option<Arc<dyn TrustScorer>>) {
        *self.trust.write() = scorer;
    }

    /// Run both checks in order; the first failure short-circuits.
    pub async fn evaluate(&self, event: &TriggerEvent, route: &ResolvedRoute) -> GateDecision {
        let mut validated = false;

        if route.requires_constitutional_validation || event.requires_validation {
            let validator = self.constitutional.read().clone();
            match validator {
                Some(validator) => {
                    let call = AssertUnwindSafe(validator.approve(event)).catch_unwind();
                    match tokio::time::timeout(self.timeout, call).await {
                        Ok(Ok(true)) => validated = true,
                        Ok(Ok(false)) => return GateDecision::Blocked(BlockReason::ConstitutionalRejected),
                        Ok(Err(_)) => {
                            log_mesh_event!(
                                error,
                                "dispatcher",
                                "Constitutional validator panicked, blocking event",
                                event_id = %event.id()
                            );
                            return GateDecision::Blocked(BlockReason::ConstitutionalRejected);
                        }
                        Err(_) => {
                            return GateDecision::Blocked(BlockReason::ValidationTimeout {
                                check: ValidationCheck::Constitutional,
                            })
                        }
                    }
                }
                None => self.warn_unset(route, event, ValidationCheck::Constitutional),
            }
        }

        if let Some(threshold) = route.min_trust_score {
            let scorer = self.trust.read().clone();
            let score = match scorer {
                Some(scorer) => {
                    let call = AssertUnwindSafe(scorer.score(&event.source)).catch_unwind();
                    match tokio::time::timeout(self.timeout, call).await {
                        Ok(Ok(score)) => Some(clamp_unit(score)),
                        Ok(Err(_)) => {
                            log_mesh_event!(
                                error,
                                "dispatcher",
                                "Trust scorer panicked, treating score as 0",
                                source = %event.source
                            );
                            Some(0.0)
                        }
                        Err(_) => {
                            return GateDecision::Blocked(BlockReason::ValidationTimeout {
                                check: ValidationCheck::TrustScore,
                            })
                        }
                    }
                }
                None => {
                    self.warn_unset(route, event, ValidationCheck::TrustScore);
                    self.trust_fallback.then_some(event.trust_score)
                }
            };

            if let Some(score) = score {
                if score < threshold {
                    return GateDecision::Blocked(BlockReason::TrustScoreTooLow { score, threshold });
                }
                validated = true;
            }
        }

        GateDecision::Approved { validated }
    }

    /// Log once per (rule set, check) that a requested check was skipped.
    fn warn_unset(&self, route: &ResolvedRoute, event: &TriggerEvent, check: ValidationCheck) {
        let rule = if route.rule_ids.is_empty() {
            format!("event-flag:{}", event.event_type)
        } else {
            route.rule_key()
        };
        if self.warned.lock().insert((rule.clone(), check)) {
            log_mesh_event!(
                warn,
                "dispatcher",
                "Validation requested but no validator registered, skipping check",
                rule = %rule,
                check = ?check
            );
        }
    }

    #[cfg(test)]
    fn warning_count(&self) -> usize {
        self.warned.lock().len()
    }
}
