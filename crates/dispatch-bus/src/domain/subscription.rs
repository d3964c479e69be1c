//! # Subscriptions
//!
//! A subscription binds a handler to one event kind together with its
//! priority, optional filter, optional timeout and error policy.
//!
//! ## Lifecycle
//!
//! ```text
//!            unsubscribe / handle.cancel()
//!          ┌────────────────────────────────┐
//!          │         timeout elapsed        ▼
//!     [ACTIVE] ────────────────────────→ [CANCELLED]
//!          │                                ▲
//!          └── handler error (remove_on_error)
//! ```
//!
//! `CANCELLED` is terminal. A cancelled subscription is pruned from the
//! registry and never receives another event, even through a stale handle.

use super::errors::{panic_message, HandlerError};
use super::event::{DispatchEvent, Event};
use super::registry::SubscriptionRegistry;
use super::statistics::CancelReason;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Type-erased async event handler.
pub type EventHandler<E> =
    Arc<dyn Fn(Arc<Event<E>>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Synchronous filter predicate evaluated before a handler is invoked.
pub type EventPredicate<E> = Arc<dyn Fn(&Event<E>) -> bool + Send + Sync>;

/// Box an async closure into an [`EventHandler`].
pub fn handler_fn<E, F, Fut>(handler: F) -> EventHandler<E>
where
    E: DispatchEvent,
    F: Fn(Arc<Event<E>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |event| handler(event).boxed())
}

/// Registry-assigned subscription identifier.
///
/// Identifiers increase monotonically, so they also encode registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Externally visible lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Cancelled,
}

/// Options accepted by `subscribe`.
///
/// ```rust
/// use dispatch_bus::SubscribeOptions;
/// use std::time::Duration;
/// # use dispatch_bus::DispatchEvent;
/// # #[derive(Debug)] struct Ping;
/// # impl DispatchEvent for Ping { type Kind = (); fn kind(&self) {} }
///
/// let options: SubscribeOptions<Ping> = SubscribeOptions::new()
///     .priority(5)
///     .remove_on_error(true)
///     .timeout(Duration::from_secs(30))
///     .label("audit");
/// ```
pub struct SubscribeOptions<E> {
    pub(crate) priority: Option<i32>,
    pub(crate) filter: Option<EventPredicate<E>>,
    pub(crate) remove_on_error: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) label: Option<String>,
}

impl<E> Default for SubscribeOptions<E> {
    fn default() -> Self {
        Self {
            priority: None,
            filter: None,
            remove_on_error: false,
            timeout: None,
            label: None,
        }
    }
}

impl<E: DispatchEvent> SubscribeOptions<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Higher priorities are invoked first. Defaults to the dispatcher's
    /// configured default priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Skip the handler for events the predicate rejects.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Event<E>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Cancel the subscription the first time its handler fails.
    #[must_use]
    pub fn remove_on_error(mut self, remove_on_error: bool) -> Self {
        self.remove_on_error = remove_on_error;
        self
    }

    /// Cancel the subscription once `timeout` has elapsed.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Human-readable name used in logs and failure reports.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<E> fmt::Debug for SubscribeOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("priority", &self.priority)
            .field("filter", &self.filter.is_some())
            .field("remove_on_error", &self.remove_on_error)
            .field("timeout", &self.timeout)
            .field("label", &self.label)
            .finish()
    }
}

/// Outcome of evaluating a subscription's filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FilterVerdict {
    Accept,
    Reject,
    /// The predicate panicked; treated as a rejection.
    Failed(String),
}

/// A registered subscription. Owned by the registry.
pub(crate) struct Subscription<E: DispatchEvent> {
    id: SubscriptionId,
    kind: E::Kind,
    priority: i32,
    handler: EventHandler<E>,
    filter: Option<EventPredicate<E>>,
    remove_on_error: bool,
    label: Option<String>,
    deadline: Option<Instant>,
    active: AtomicBool,
    timer: Mutex<Option<AbortHandle>>,
}

impl<E: DispatchEvent> Subscription<E> {
    pub(crate) fn new(
        id: SubscriptionId,
        kind: E::Kind,
        priority: i32,
        handler: EventHandler<E>,
        options: SubscribeOptions<E>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            kind,
            priority,
            handler,
            filter: options.filter,
            remove_on_error: options.remove_on_error,
            label: options.label,
            deadline: options.timeout.map(|timeout| now + timeout),
            active: AtomicBool::new(true),
            timer: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn kind(&self) -> E::Kind {
        self.kind
    }

    pub(crate) fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn remove_on_error(&self) -> bool {
        self.remove_on_error
    }

    pub(crate) fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn has_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub(crate) fn is_active_at(&self, now: Instant) -> bool {
        self.active.load(Ordering::Acquire) && !self.has_expired(now)
    }

    /// Flip to cancelled and stop any pending timeout timer.
    ///
    /// Returns `false` if the subscription was already cancelled.
    pub(crate) fn deactivate(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        was_active
    }

    pub(crate) fn attach_timer(&self, timer: AbortHandle) {
        let mut slot = self.timer.lock();
        if self.active.load(Ordering::Acquire) {
            *slot = Some(timer);
        } else {
            timer.abort();
        }
    }

    pub(crate) fn evaluate_filter(&self, event: &Event<E>) -> FilterVerdict {
        let Some(filter) = &self.filter else {
            return FilterVerdict::Accept;
        };

        match catch_unwind(AssertUnwindSafe(|| filter(event))) {
            Ok(true) => FilterVerdict::Accept,
            Ok(false) => FilterVerdict::Reject,
            Err(payload) => FilterVerdict::Failed(panic_message(payload.as_ref())),
        }
    }

    /// Call the handler, producing its pending unit of work.
    ///
    /// Panics, whether raised while creating the future or while polling it,
    /// settle as [`HandlerError::Panicked`].
    pub(crate) fn invoke(&self, event: Arc<Event<E>>) -> BoxFuture<'static, Result<(), HandlerError>> {
        let handler = &self.handler;
        match catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(work) => AssertUnwindSafe(work)
                .catch_unwind()
                .map(|settled| match settled {
                    Ok(result) => result,
                    Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
                })
                .boxed(),
            Err(payload) => {
                futures::future::ready(Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
                    .boxed()
            }
        }
    }
}

impl<E: DispatchEvent> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("label", &self.label)
            .field("remove_on_error", &self.remove_on_error)
            .field("deadline", &self.deadline)
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish()
    }
}

/// Opaque handle returned by `subscribe`.
///
/// The handle only holds a weak reference to the registry, so it never keeps
/// a disposed dispatcher alive.
pub struct SubscriptionHandle<E: DispatchEvent> {
    id: SubscriptionId,
    kind: E::Kind,
    registry: Weak<SubscriptionRegistry<E>>,
}

impl<E: DispatchEvent> SubscriptionHandle<E> {
    pub(crate) fn new(
        id: SubscriptionId,
        kind: E::Kind,
        registry: Weak<SubscriptionRegistry<E>>,
    ) -> Self {
        Self { id, kind, registry }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> E::Kind {
        self.kind
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        match self.registry.upgrade() {
            Some(registry) if registry.is_active(self.id) => SubscriptionState::Active,
            _ => SubscriptionState::Cancelled,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Cancel the subscription. Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id, CancelReason::Unsubscribed))
    }
}

impl<E: DispatchEvent> Clone for SubscriptionHandle<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<E: DispatchEvent> fmt::Debug for SubscriptionHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}
