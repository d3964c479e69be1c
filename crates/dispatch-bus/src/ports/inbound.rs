//! Inbound (driving) port of the dispatch core.
//!
//! This is the API host code (UI layers, services) uses. The trait is object
//! safe so hosts can depend on `Arc<dyn EventDispatcherApi<E>>` and swap in a
//! test double.

use crate::domain::errors::DispatchError;
use crate::domain::event::{DispatchEvent, Event};
use crate::domain::interceptor::InterceptorId;
use crate::domain::outcome::PublishOutcome;
use crate::domain::statistics::StatisticsSnapshot;
use crate::domain::subscription::{EventHandler, SubscribeOptions, SubscriptionHandle};
use crate::observer::{ObservationFilter, ObservationStream};
use crate::ports::outbound::Interceptor;
use async_trait::async_trait;
use std::sync::Arc;

/// Primary API of an event dispatcher.
#[async_trait]
pub trait EventDispatcherApi<E: DispatchEvent>: Send + Sync {
    /// Publish an event and wait until every matching handler has settled.
    ///
    /// # Errors
    ///
    /// - `DispatchError::Disposed` - the dispatcher was disposed
    /// - `DispatchError::Interceptor` - a before/after hook failed
    async fn publish(&self, event: Event<E>) -> Result<PublishOutcome, DispatchError>;

    /// Wrap `payload` in a fresh [`Event`] and publish it.
    async fn fire(&self, payload: E) -> Result<PublishOutcome, DispatchError>;

    /// Register a handler for one event kind.
    ///
    /// # Errors
    ///
    /// - `DispatchError::Disposed` - the dispatcher was disposed
    /// - `DispatchError::NoRuntime` - a timeout was requested outside tokio
    fn subscribe_handler(
        &self,
        kind: E::Kind,
        handler: EventHandler<E>,
        options: SubscribeOptions<E>,
    ) -> Result<SubscriptionHandle<E>, DispatchError>;

    /// Cancel one subscription. Cancelling twice is not an error.
    ///
    /// Returns whether this call cancelled it.
    fn unsubscribe(&self, handle: &SubscriptionHandle<E>) -> Result<bool, DispatchError>;

    /// Cancel every subscription for `kind`. Returns how many were cancelled.
    fn unsubscribe_all(&self, kind: E::Kind) -> Result<usize, DispatchError>;

    fn add_interceptor(&self, interceptor: Arc<dyn Interceptor<E>>) -> Result<InterceptorId, DispatchError>;

    fn remove_interceptor(&self, id: InterceptorId) -> Result<bool, DispatchError>;

    /// Stream of every published event, regardless of kind.
    fn observe_all(&self) -> Result<ObservationStream<E>, DispatchError>;

    /// Stream of published events restricted by `filter`.
    fn observe(&self, filter: ObservationFilter<E::Kind>) -> Result<ObservationStream<E>, DispatchError>;

    fn statistics(&self) -> Result<StatisticsSnapshot<E::Kind>, DispatchError>;

    /// Cancel all subscriptions, detach all interceptors and close the
    /// observation stream. Every later call fails with `Disposed`.
    fn dispose(&self) -> Result<(), DispatchError>;
}
