//! Publish outcomes returned to callers.

use super::errors::HandlerError;
use super::event::EventId;
use super::subscription::SubscriptionId;

/// Result of a completed `publish` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A before-hook stopped the publish. No subscriber saw the event.
    Aborted {
        event_id: EventId,
        interceptor: String,
    },
    /// The event was fanned out and every handler has settled.
    Delivered(DeliveryReport),
}

impl PublishOutcome {
    #[must_use]
    pub fn event_id(&self) -> EventId {
        match self {
            Self::Aborted { event_id, .. } => *event_id,
            Self::Delivered(report) => report.event_id,
        }
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// The delivery report, unless the publish was aborted.
    #[must_use]
    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            Self::Aborted { .. } => None,
            Self::Delivered(report) => Some(report),
        }
    }
}

/// What happened during fan-out of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub event_id: EventId,
    /// Handlers invoked, successful or not.
    pub invoked: usize,
    /// Subscriptions skipped because their filter rejected the event.
    pub skipped_by_filter: usize,
    /// Subscriptions skipped because their filter panicked.
    pub filter_errors: usize,
    /// Handlers that failed, in invocation order.
    pub failures: Vec<HandlerFailure>,
}

impl DeliveryReport {
    pub(crate) fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            invoked: 0,
            skipped_by_filter: 0,
            filter_errors: 0,
            failures: Vec::new(),
        }
    }

    /// Handlers that settled successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.invoked - self.failures.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A handler failure recorded during fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription_id: SubscriptionId,
    pub label: Option<String>,
    pub error: HandlerError,
    /// Whether `remove_on_error` cancelled the subscription.
    pub removed: bool,
}
