//! # Global Observation Stream
//!
//! Secondary broadcast channel that receives every published event,
//! independent of type-specific subscriptions. Meant for monitoring and
//! debugging: observers cannot fail a publish and a slow observer only loses
//! its own backlog.

use crate::domain::event::{DispatchEvent, Event};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// Restricts an observation stream to a set of kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationFilter<K> {
    /// Kinds to include. Empty means all kinds.
    pub kinds: Vec<K>,
}

impl<K> Default for ObservationFilter<K> {
    fn default() -> Self {
        Self { kinds: Vec::new() }
    }
}

impl<K: PartialEq> ObservationFilter<K> {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific kinds.
    #[must_use]
    pub fn kinds(kinds: Vec<K>) -> Self {
        Self { kinds }
    }

    /// Check if an event kind passes this filter.
    #[must_use]
    pub fn matches(&self, kind: &K) -> bool {
        self.kinds.is_empty() || self.kinds.contains(kind)
    }
}

/// Receiving end of the observation channel.
///
/// Ends (yields `None`) once the dispatcher is disposed and the backlog has
/// been drained.
pub struct ObservationStream<E: DispatchEvent> {
    inner: BroadcastStream<Arc<Event<E>>>,
    filter: ObservationFilter<E::Kind>,
}

impl<E: DispatchEvent> ObservationStream<E> {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Arc<Event<E>>>,
        filter: ObservationFilter<E::Kind>,
    ) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next matching event
    /// - `None` - The dispatcher was disposed
    pub async fn recv(&mut self) -> Option<Arc<Event<E>>> {
        self.next().await
    }

    #[must_use]
    pub fn filter(&self) -> &ObservationFilter<E::Kind> {
        &self.filter
    }
}

// No field is structurally pinned.
impl<E: DispatchEvent> Unpin for ObservationStream<E> {}

impl<E: DispatchEvent> Stream for ObservationStream<E> {
    type Item = Arc<Event<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event.kind()) {
                        return Poll::Ready(Some(event));
                    }
                    // Event doesn't match filter, keep polling
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Observer lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<E: DispatchEvent> std::fmt::Debug for ObservationStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationStream")
            .field("filter", &self.filter)
            .finish()
    }
}
