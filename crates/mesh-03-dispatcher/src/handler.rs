//! # Component Handlers
//!
//! Handlers are bound either to a component id (catalogue targets) or to an
//! event-type pattern (runtime subscriptions).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{ComponentId, EventPattern, HandlerError, TriggerEvent};

/// Callback invoked for each event delivered to a target.
///
/// Errors and panics are caught by the dispatcher and recorded against this
/// target only.
#[async_trait]
pub trait ComponentHandler: Send + Sync {
    async fn handle(&self, event: &TriggerEvent) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into a `ComponentHandler`.
pub struct FnHandler<F>(F);

/// Wrap a closure taking an owned event.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ComponentHandler>
where
    F: Fn(TriggerEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait]
impl<F, Fut> ComponentHandler for FnHandler<F>
where
    F: Fn(TriggerEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: &TriggerEvent) -> Result<(), HandlerError> {
        (self.0)(event.clone()).await
    }
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Target label used in delivery reports.
    pub fn target(&self) -> ComponentId {
        ComponentId::new(format!("subscription:{}", self.0))
    }
}

#[derive(Clone)]
pub(crate) struct Subscription {
    pub id: SubscriptionId,
    pub pattern: EventPattern,
    pub handler: Arc<dyn ComponentHandler>,
}

/// Registered component handlers and pattern subscriptions.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    components: RwLock<HashMap<ComponentId, Arc<dyn ComponentHandler>>>,
    subscriptions: RwLock<Vec<Subscription>>,
    next_subscription: AtomicU64,
}

impl HandlerRegistry {
    /// Bind a handler to a component, replacing any previous binding.
    pub fn register(&self, component: ComponentId, handler: Arc<dyn ComponentHandler>) -> bool {
        self.components.write().insert(component, handler).is_some()
    }

    pub fn unregister(&self, component: &ComponentId) -> bool {
        self.components.write().remove(component).is_some()
    }

    pub fn component(&self, component: &ComponentId) -> Option<Arc<dyn ComponentHandler>> {
        self.components.read().get(component).cloned()
    }

    pub fn subscribe(&self, pattern: EventPattern, handler: Arc<dyn ComponentHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);
        self.subscriptions.write().push(Subscription {
            id,
            pattern,
            handler,
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Subscriptions matching an event type, in registration order.
    pub fn matching(&self, event_type: &str) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.pattern.matches(event_type))
            .cloned()
            .collect()
    }
}
