//! # Core Mesh Entities
//!
//! Defines the message types that flow through the Governed Event Mesh.
//!
//! ## Clusters
//!
//! - **Identity**: `ComponentId`, `EventId`
//! - **Messages**: `TriggerEvent`, `Payload`
//! - **Routing keys**: `RouteKey`

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Opaque unique identifier of a `TriggerEvent`.
pub type EventId = Uuid;

/// Structured, serializable event payload.
pub type Payload = Map<String, Value>;

/// Identifier of a component attached to the mesh (publisher or target).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    /// Create a component id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ComponentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Primary routing lookup key: `(source, event_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    /// Emitting component.
    pub source: ComponentId,
    /// Dotted event type.
    pub event_type: String,
}

impl RouteKey {
    pub fn new(source: impl Into<ComponentId>, event_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.event_type)
    }
}

/// A typed message in flight through the mesh.
///
/// The `event_id` is generated at creation and cannot be changed afterwards;
/// every other field may be adjusted by the producer through the builder
/// methods before the event is emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    event_id: EventId,
    /// Hierarchical dotted type, e.g. `governance.policy_violation`.
    pub event_type: String,
    /// Emitting component.
    pub source: ComponentId,
    /// Human, agent or service that caused the event.
    pub actor: String,
    /// Object the event concerns.
    pub resource: Option<String>,
    /// Opaque structured data.
    pub payload: Payload,
    /// Producer-attached trust score in `[0, 1]`.
    pub trust_score: f64,
    /// Forces the validation gate even when the matched rule does not ask for it.
    pub requires_validation: bool,
    /// Groups causally related events in the audit ledger.
    pub correlation_id: Option<String>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl TriggerEvent {
    /// Create an event with a fresh id, empty payload and full trust.
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<ComponentId>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            source: source.into(),
            actor: actor.into(),
            resource: None,
            payload: Payload::new(),
            trust_score: 1.0,
            requires_validation: false,
            correlation_id: None,
            timestamp: Utc::now(),
        }
    }

    /// The immutable event id.
    pub fn id(&self) -> EventId {
        self.event_id
    }

    /// The primary routing key for this event.
    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.source.clone(), self.event_type.clone())
    }

    /// Correlation marker used for audit replay: the explicit correlation id
    /// or, when absent, the event id.
    pub fn correlation(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| self.event_id.to_string())
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Insert a single payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Attach a trust score, clamped into `[0, 1]` (NaN becomes 0).
    #[must_use]
    pub fn with_trust_score(mut self, score: f64) -> Self {
        self.trust_score = clamp_unit(score);
        self
    }

    #[must_use]
    pub fn requiring_validation(mut self) -> Self {
        self.requires_validation = true;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Clamp a score into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
