//! Telemetry interceptors.
//!
//! Both are ordinary [`Interceptor`]s: add them to a dispatcher with
//! `add_interceptor`. Register them first so they wrap everything else.

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Instant;

use async_trait::async_trait;
use dispatch_bus::{
    DispatchError, DispatchEvent, Event, EventId, InterceptDecision, Interceptor,
    InterceptorError, PublishOutcome,
};
use parking_lot::Mutex;

use crate::metrics::{EVENTS_ABORTED, EVENTS_PUBLISHED, INTERCEPTOR_ERRORS, PUBLISH_DURATION};

fn kind_label<K: Debug>(kind: K) -> String {
    format!("{kind:?}")
}

/// Logs every publish at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl TracingInterceptor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<E: DispatchEvent> Interceptor<E> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn before_publish(&self, event: &Event<E>) -> Result<InterceptDecision, InterceptorError> {
        tracing::debug!(
            event_id = %event.id(),
            kind = ?event.kind(),
            created_at = event.created_at(),
            "Publishing event"
        );
        Ok(InterceptDecision::Continue)
    }

    async fn after_publish(&self, event: &Event<E>) -> Result<(), InterceptorError> {
        tracing::debug!(event_id = %event.id(), kind = ?event.kind(), "Event settled");
        Ok(())
    }
}

/// Feeds the dispatch Prometheus metrics.
///
/// Duration is measured from this interceptor's before-hook to its
/// after-hook. Aborted and failed publishes never reach the after-hook; they
/// are counted in [`Interceptor::on_settled`], which also drops the pending
/// start time, so the map only holds publishes still in flight.
#[derive(Debug, Default)]
pub struct MetricsInterceptor {
    started: Mutex<HashMap<EventId, Instant>>,
}

impl MetricsInterceptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes currently between before-hook and settlement.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.started.lock().len()
    }
}

#[async_trait]
impl<E: DispatchEvent> Interceptor<E> for MetricsInterceptor {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn before_publish(&self, event: &Event<E>) -> Result<InterceptDecision, InterceptorError> {
        self.started.lock().insert(event.id(), Instant::now());
        Ok(InterceptDecision::Continue)
    }

    async fn after_publish(&self, event: &Event<E>) -> Result<(), InterceptorError> {
        let started = self.started.lock().remove(&event.id());
        if let Some(started) = started {
            PUBLISH_DURATION.observe(started.elapsed().as_secs_f64());
        }
        let label = kind_label(event.kind());
        EVENTS_PUBLISHED.with_label_values(&[label.as_str()]).inc();
        Ok(())
    }

    fn on_settled(&self, event: &Event<E>, result: &Result<PublishOutcome, DispatchError>) {
        self.started.lock().remove(&event.id());

        match result {
            Ok(PublishOutcome::Delivered(_)) => {}
            Ok(PublishOutcome::Aborted { .. }) => {
                let label = kind_label(event.kind());
                EVENTS_ABORTED.with_label_values(&[label.as_str()]).inc();
            }
            Err(DispatchError::Interceptor { .. }) => INTERCEPTOR_ERRORS.inc(),
            Err(_) => {}
        }
    }
}
