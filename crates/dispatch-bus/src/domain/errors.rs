//! Dispatch error types.
//!
//! Only interceptor failures and disposal preconditions ever reach a
//! publisher. Handler failures are contained per subscription and surface in
//! the [`DeliveryReport`](super::outcome::DeliveryReport) instead.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by dispatcher operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher was disposed and can no longer be used.
    #[error("Dispatcher has been disposed")]
    Disposed,

    /// A before/after hook failed; the rest of the publish was abandoned.
    #[error("Interceptor '{interceptor}' failed: {source}")]
    Interceptor {
        interceptor: String,
        #[source]
        source: InterceptorError,
    },

    /// A subscription timeout was requested outside a tokio runtime.
    #[error("Subscription timeouts require a running tokio runtime")]
    NoRuntime,
}

/// Failure of a single subscription's handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// The handler panicked while running.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// The handler did not settle within the configured deadline.
    #[error("Handler exceeded deadline of {0:?}")]
    TimedOut(Duration),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure raised by an interceptor hook.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct InterceptorError {
    message: String,
}

impl InterceptorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
