//! Outbound (driven) ports of the dispatcher.
//!
//! Host code plugs into the dispatcher through these traits: interceptors for
//! cross-cutting concerns around every publish, and a clock for stamping events.

use crate::domain::errors::{DispatchError, InterceptorError};
use crate::domain::event::{DispatchEvent, Event, Timestamp};
use crate::domain::outcome::PublishOutcome;
use async_trait::async_trait;

/// Decision returned by [`Interceptor::before_publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDecision {
    /// Let the publish proceed to the next interceptor and the subscribers.
    Continue,
    /// Stop the publish. No subscriber and no later interceptor sees the event.
    Abort,
}

/// Before/after hook wrapped around every publish.
///
/// Interceptors are trusted infrastructure (logging, auditing, metrics).
/// Unlike handler failures, an error returned here propagates to the caller
/// of `publish`.
#[async_trait]
pub trait Interceptor<E: DispatchEvent>: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Runs before any subscriber sees the event.
    async fn before_publish(&self, event: &Event<E>) -> Result<InterceptDecision, InterceptorError> {
        let _ = event;
        Ok(InterceptDecision::Continue)
    }

    /// Runs once every handler for the event has settled.
    async fn after_publish(&self, event: &Event<E>) -> Result<(), InterceptorError> {
        let _ = event;
        Ok(())
    }

    /// Called with the final result of every publish whose before-hook ran
    /// on this interceptor, including aborted and failed ones.
    ///
    /// Interceptors holding per-event state release it here.
    fn on_settled(&self, event: &Event<E>, result: &Result<PublishOutcome, DispatchError>) {
        let _ = (event, result);
    }
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}
