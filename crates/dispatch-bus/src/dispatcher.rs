//! # Dispatcher
//!
//! Orchestrates publication: interceptors, observation stream, fan-out.
//!
//! ## Publish Pipeline
//!
//! ```text
//! publish(event)
//!   │
//!   ├─ 1. before-hooks (registration order) ──Abort──→ return Aborted
//!   ├─ 2. broadcast on the observation stream
//!   ├─ 3. registry snapshot for event.kind()   (priority desc, then FIFO)
//!   ├─ 4. per subscription: filter → invoke handler → pending work
//!   ├─ 5. join all pending work, isolating failures
//!   ├─ 6. after-hooks (registration order)       ──→ Delivered
//!   └─ 7. on_settled for every interceptor whose before-hook ran
//! ```
//!
//! Handlers are invoked in priority order and then run concurrently; only
//! invocation order is guaranteed. A failing handler never affects its
//! siblings or the publisher. Interceptor failures are returned to the
//! publisher.

use crate::config::DispatcherConfig;
use crate::domain::errors::{DispatchError, HandlerError};
use crate::domain::event::{DispatchEvent, Event};
use crate::domain::interceptor::{ChainSnapshot, InterceptorChain, InterceptorId};
use crate::domain::outcome::{DeliveryReport, HandlerFailure, PublishOutcome};
use crate::domain::registry::SubscriptionRegistry;
use crate::domain::statistics::{CancelReason, StatisticsSnapshot};
use crate::domain::subscription::{
    handler_fn, EventHandler, FilterVerdict, SubscribeOptions, Subscription, SubscriptionHandle,
};
use crate::observer::{ObservationFilter, ObservationStream};
use crate::ports::inbound::EventDispatcherApi;
use crate::ports::outbound::{Interceptor, SystemTimeSource, TimeSource};
use async_trait::async_trait;
use futures::future::{join_all, FutureExt};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct DispatcherInner<E: DispatchEvent> {
    config: DispatcherConfig,
    registry: Arc<SubscriptionRegistry<E>>,
    interceptors: InterceptorChain<E>,
    /// Taken on dispose, which closes every observation stream.
    observation: RwLock<Option<broadcast::Sender<Arc<Event<E>>>>>,
    time_source: Arc<dyn TimeSource>,
    disposed: AtomicBool,
    events_published: AtomicU64,
    events_aborted: AtomicU64,
}

/// Typed publish/subscribe dispatcher.
///
/// Cloning is cheap and every clone shares the same registry, interceptors
/// and observation channel. There is no process-wide default instance; build
/// one at the composition root and pass it where it is needed.
pub struct Dispatcher<E: DispatchEvent> {
    inner: Arc<DispatcherInner<E>>,
}

impl<E: DispatchEvent> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: DispatchEvent> Dispatcher<E> {
    /// Create a dispatcher with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    #[must_use]
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Create a dispatcher whose `fire` stamps events with `time_source`.
    #[must_use]
    pub fn with_time_source(config: DispatcherConfig, time_source: Arc<dyn TimeSource>) -> Self {
        let (sender, _) = broadcast::channel(config.observation_capacity.max(1));
        Self {
            inner: Arc::new(DispatcherInner {
                config,
                registry: Arc::new(SubscriptionRegistry::new()),
                interceptors: InterceptorChain::new(),
                observation: RwLock::new(Some(sender)),
                time_source,
                disposed: AtomicBool::new(false),
                events_published: AtomicU64::new(0),
                events_aborted: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Active subscriptions for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.inner.registry.active_count(kind)
    }

    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.inner.interceptors.len()
    }

    /// Register an async closure as a handler for `kind`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let handle = dispatcher.subscribe(
    ///     Kind::Login,
    ///     |event| async move {
    ///         audit(event.payload()).await;
    ///         Ok(())
    ///     },
    ///     SubscribeOptions::new().priority(5),
    /// )?;
    /// ```
    ///
    /// # Errors
    ///
    /// - `DispatchError::Disposed` - the dispatcher was disposed
    /// - `DispatchError::NoRuntime` - a timeout was requested outside tokio
    pub fn subscribe<F, Fut>(
        &self,
        kind: E::Kind,
        handler: F,
        options: SubscribeOptions<E>,
    ) -> Result<SubscriptionHandle<E>, DispatchError>
    where
        F: Fn(Arc<Event<E>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(kind, handler_fn(handler), options)
    }

    fn register(
        &self,
        kind: E::Kind,
        handler: EventHandler<E>,
        options: SubscribeOptions<E>,
    ) -> Result<SubscriptionHandle<E>, DispatchError> {
        self.ensure_active()?;

        let timeout = options.timeout;
        let runtime = match timeout {
            Some(_) => Some(Handle::try_current().map_err(|_| DispatchError::NoRuntime)?),
            None => None,
        };
        let priority = options.priority.unwrap_or(self.inner.config.default_priority);
        let now = Instant::now();

        let subscription = self
            .inner
            .registry
            .register(|id| Subscription::new(id, kind, priority, handler, options, now));
        let id = subscription.id();

        // A concurrent dispose may have cleared the registry before our insert.
        if self.is_disposed() {
            self.inner.registry.remove(id, CancelReason::Disposed);
            return Err(DispatchError::Disposed);
        }

        if let (Some(runtime), Some(timeout)) = (runtime, timeout) {
            let registry = Arc::downgrade(&self.inner.registry);
            let timer = runtime.spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(registry) = registry.upgrade() {
                    if registry.remove(id, CancelReason::Expired) {
                        debug!(subscription_id = %id, ?timeout, "Subscription expired");
                    }
                }
            });
            subscription.attach_timer(timer.abort_handle());
        }

        debug!(
            subscription_id = %id,
            kind = ?kind,
            priority,
            label = subscription.label(),
            "New subscription created"
        );

        Ok(SubscriptionHandle::new(
            id,
            kind,
            Arc::downgrade(&self.inner.registry),
        ))
    }

    /// Publish an event and wait for every matching handler to settle.
    ///
    /// Every interceptor whose before-hook ran is told the final result
    /// through [`Interceptor::on_settled`], whether the publish was delivered,
    /// aborted or failed.
    ///
    /// # Errors
    ///
    /// - `DispatchError::Disposed` - the dispatcher was disposed
    /// - `DispatchError::NoRuntime` - a handler deadline is configured but the
    ///   publish is not running inside tokio
    /// - `DispatchError::Interceptor` - a before/after hook failed
    pub async fn publish(&self, event: Event<E>) -> Result<PublishOutcome, DispatchError> {
        self.ensure_active()?;
        if self.inner.config.handler_timeout.is_some() {
            Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        }

        let event = Arc::new(event);
        let chain = self.inner.interceptors.snapshot();

        let result = self.run_pipeline(&chain, &event).await;
        chain.settle(&event, &result);
        result
    }

    async fn run_pipeline(
        &self,
        chain: &ChainSnapshot<E>,
        event: &Arc<Event<E>>,
    ) -> Result<PublishOutcome, DispatchError> {
        if let Some(interceptor) = chain.run_before(event).await? {
            self.inner.events_aborted.fetch_add(1, Ordering::Relaxed);
            if self.inner.config.observe_aborted {
                self.broadcast(event);
            }
            debug!(
                event_id = %event.id(),
                kind = ?event.kind(),
                interceptor = %interceptor,
                "Publish aborted by interceptor"
            );
            return Ok(PublishOutcome::Aborted {
                event_id: event.id(),
                interceptor,
            });
        }

        self.inner.events_published.fetch_add(1, Ordering::Relaxed);
        self.broadcast(event);

        let report = self.fan_out(event).await;

        chain.run_after(event).await?;

        debug!(
            event_id = %event.id(),
            kind = ?event.kind(),
            invoked = report.invoked,
            failed = report.failures.len(),
            "Event published"
        );
        Ok(PublishOutcome::Delivered(report))
    }

    /// Wrap `payload` in a fresh event and publish it.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::publish`].
    pub async fn fire(&self, payload: E) -> Result<PublishOutcome, DispatchError> {
        let event = Event::with_time_source(payload, self.inner.time_source.as_ref());
        self.publish(event).await
    }

    fn broadcast(&self, event: &Arc<Event<E>>) {
        let observation = self.inner.observation.read();
        let Some(sender) = observation.as_ref() else {
            return;
        };

        if sender.send(Arc::clone(event)).is_err() {
            // No observers attached; the event is still delivered to subscribers.
            debug!(event_id = %event.id(), "No observers for event");
        }
    }

    async fn fan_out(&self, event: &Arc<Event<E>>) -> DeliveryReport {
        let kind = event.kind();
        let snapshot = self.inner.registry.snapshot(kind, Instant::now());

        for id in &snapshot.expired {
            if self.inner.registry.remove(*id, CancelReason::Expired) {
                debug!(subscription_id = %id, kind = ?kind, "Pruned expired subscription");
            }
        }
        snapshot.counters.record_published();

        let mut report = DeliveryReport::new(event.id());
        let mut pending = Vec::with_capacity(snapshot.subscriptions.len());

        for subscription in snapshot.subscriptions {
            match subscription.evaluate_filter(event) {
                FilterVerdict::Accept => {}
                FilterVerdict::Reject => {
                    snapshot.counters.record_filter_rejection();
                    report.skipped_by_filter += 1;
                    continue;
                }
                FilterVerdict::Failed(reason) => {
                    snapshot.counters.record_filter_error();
                    report.filter_errors += 1;
                    warn!(
                        event_id = %event.id(),
                        subscription_id = %subscription.id(),
                        label = subscription.label(),
                        reason = %reason,
                        "Filter panicked, skipping handler"
                    );
                    continue;
                }
            }

            report.invoked += 1;
            let work = subscription.invoke(Arc::clone(event));
            let work = match self.inner.config.handler_timeout {
                Some(limit) => tokio::time::timeout(limit, work)
                    .map(move |settled| settled.unwrap_or(Err(HandlerError::TimedOut(limit))))
                    .boxed(),
                None => work,
            };
            pending.push(work.map(move |result| (subscription, result)));
        }

        for (subscription, result) in join_all(pending).await {
            let Err(error) = result else {
                continue;
            };

            snapshot.counters.record_handler_failure();
            let removed = subscription.remove_on_error()
                && self
                    .inner
                    .registry
                    .remove(subscription.id(), CancelReason::HandlerError);

            warn!(
                event_id = %event.id(),
                kind = ?kind,
                subscription_id = %subscription.id(),
                label = subscription.label(),
                error = %error,
                removed,
                "Handler failed"
            );

            report.failures.push(HandlerFailure {
                subscription_id: subscription.id(),
                label: subscription.label().map(str::to_string),
                error,
                removed,
            });
        }

        report
    }

    /// Cancel one subscription. Idempotent.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle<E>) -> Result<bool, DispatchError> {
        self.ensure_active()?;
        Ok(self
            .inner
            .registry
            .remove(handle.id(), CancelReason::Unsubscribed))
    }

    /// Cancel every subscription for `kind`.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn unsubscribe_all(&self, kind: E::Kind) -> Result<usize, DispatchError> {
        self.ensure_active()?;
        Ok(self
            .inner
            .registry
            .remove_all(kind, CancelReason::Unsubscribed))
    }

    /// Append an interceptor to the chain.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn add_interceptor(
        &self,
        interceptor: Arc<dyn Interceptor<E>>,
    ) -> Result<InterceptorId, DispatchError> {
        self.ensure_active()?;
        Ok(self.inner.interceptors.add(interceptor))
    }

    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn remove_interceptor(&self, id: InterceptorId) -> Result<bool, DispatchError> {
        self.ensure_active()?;
        Ok(self.inner.interceptors.remove(id))
    }

    /// Stream of every published event.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn observe_all(&self) -> Result<ObservationStream<E>, DispatchError> {
        self.observe(ObservationFilter::all())
    }

    /// Stream of published events restricted to the kinds in `filter`.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn observe(
        &self,
        filter: ObservationFilter<E::Kind>,
    ) -> Result<ObservationStream<E>, DispatchError> {
        self.ensure_active()?;
        let observation = self.inner.observation.read();
        let sender = observation.as_ref().ok_or(DispatchError::Disposed)?;
        Ok(ObservationStream::new(sender.subscribe(), filter))
    }

    /// Snapshot of subscription counts and activity.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was disposed.
    pub fn statistics(&self) -> Result<StatisticsSnapshot<E::Kind>, DispatchError> {
        self.ensure_active()?;
        Ok(StatisticsSnapshot {
            kinds: self.inner.registry.statistics(),
            events_published: self.inner.events_published.load(Ordering::Relaxed),
            events_aborted: self.inner.events_aborted.load(Ordering::Relaxed),
            interceptors: self.inner.interceptors.len(),
        })
    }

    /// Cancel all subscriptions, detach all interceptors and close the
    /// observation stream.
    ///
    /// Publishes already in flight run to completion.
    ///
    /// # Errors
    ///
    /// `DispatchError::Disposed` if the dispatcher was already disposed.
    pub fn dispose(&self) -> Result<(), DispatchError> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::Disposed);
        }

        let subscriptions = self.inner.registry.clear(CancelReason::Disposed);
        let interceptors = self.inner.interceptors.clear();
        self.inner.observation.write().take();

        info!(subscriptions, interceptors, "Dispatcher disposed");
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DispatchError> {
        if self.is_disposed() {
            return Err(DispatchError::Disposed);
        }
        Ok(())
    }
}

impl<E: DispatchEvent> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: DispatchEvent> EventDispatcherApi<E> for Dispatcher<E> {
    async fn publish(&self, event: Event<E>) -> Result<PublishOutcome, DispatchError> {
        Dispatcher::publish(self, event).await
    }

    async fn fire(&self, payload: E) -> Result<PublishOutcome, DispatchError> {
        Dispatcher::fire(self, payload).await
    }

    fn subscribe_handler(
        &self,
        kind: E::Kind,
        handler: EventHandler<E>,
        options: SubscribeOptions<E>,
    ) -> Result<SubscriptionHandle<E>, DispatchError> {
        self.register(kind, handler, options)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle<E>) -> Result<bool, DispatchError> {
        Dispatcher::unsubscribe(self, handle)
    }

    fn unsubscribe_all(&self, kind: E::Kind) -> Result<usize, DispatchError> {
        Dispatcher::unsubscribe_all(self, kind)
    }

    fn add_interceptor(
        &self,
        interceptor: Arc<dyn Interceptor<E>>,
    ) -> Result<InterceptorId, DispatchError> {
        Dispatcher::add_interceptor(self, interceptor)
    }

    fn remove_interceptor(&self, id: InterceptorId) -> Result<bool, DispatchError> {
        Dispatcher::remove_interceptor(self, id)
    }

    fn observe_all(&self) -> Result<ObservationStream<E>, DispatchError> {
        Dispatcher::observe_all(self)
    }

    fn observe(
        &self,
        filter: ObservationFilter<E::Kind>,
    ) -> Result<ObservationStream<E>, DispatchError> {
        Dispatcher::observe(self, filter)
    }

    fn statistics(&self) -> Result<StatisticsSnapshot<E::Kind>, DispatchError> {
        Dispatcher::statistics(self)
    }

    fn dispose(&self) -> Result<(), DispatchError> {
        Dispatcher::dispose(self)
    }
}
