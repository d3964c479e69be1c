//! # Events
//!
//! Defines the envelope every published value travels in.
//!
//! Hosts model their events as one sum type implementing [`DispatchEvent`].
//! The associated `Kind` tag is the dispatch key: two events with different
//! kinds never share a subscription list, and there is no supertype matching.

use crate::ports::outbound::{SystemTimeSource, TimeSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

/// Milliseconds since the UNIX epoch.
pub type Timestamp = u64;

/// A value that can be published through the dispatcher.
///
/// # Example
///
/// ```rust
/// use dispatch_bus::DispatchEvent;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Login,
///     Logout,
/// }
///
/// #[derive(Debug)]
/// enum SessionEvent {
///     Login { user: String },
///     Logout { user: String },
/// }
///
/// impl DispatchEvent for SessionEvent {
///     type Kind = Kind;
///
///     fn kind(&self) -> Kind {
///         match self {
///             Self::Login { .. } => Kind::Login,
///             Self::Logout { .. } => Kind::Logout,
///         }
///     }
/// }
/// ```
pub trait DispatchEvent: fmt::Debug + Send + Sync + 'static {
    /// Comparable tag identifying the event type.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The tag subscriptions are keyed by.
    fn kind(&self) -> Self::Kind;
}

/// Unique event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An immutable published event.
///
/// Once handed to `publish` the event is shared with every handler behind an
/// `Arc` and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<E> {
    id: EventId,
    created_at: Timestamp,
    payload: E,
}

impl<E: DispatchEvent> Event<E> {
    /// Wrap a payload, stamping it with a fresh id and the current wall clock.
    #[must_use]
    pub fn new(payload: E) -> Self {
        Self::with_time_source(payload, &SystemTimeSource)
    }

    /// Wrap a payload using an explicit clock.
    #[must_use]
    pub fn with_time_source(payload: E, time_source: &dyn TimeSource) -> Self {
        Self {
            id: EventId::new(),
            created_at: time_source.now(),
            payload,
        }
    }

    /// The dispatch key of this event.
    #[must_use]
    pub fn kind(&self) -> E::Kind {
        self.payload.kind()
    }
}

impl<E> Event<E> {
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Creation time in milliseconds since the UNIX epoch.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    #[must_use]
    pub fn payload(&self) -> &E {
        &self.payload
    }

    /// Consume the envelope, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> E {
        self.payload
    }
}
