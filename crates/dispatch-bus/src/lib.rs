//! # Dispatch Bus - Typed In-Process Event Dispatcher
//!
//! Publish/subscribe core for a single process. Publishers hand an event to
//! the dispatcher; it runs the interceptor chain, mirrors the event onto the
//! observation stream and invokes every subscription registered for the
//! event's kind.
//!
//! ## Dispatch Flow
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────────┐   ordered by priority
//! │  Publisher   │ ────────────→ │    Dispatcher    │ ──────────────────────→ handlers
//! └──────────────┘               │                  │
//!                                │  interceptors    │   observe_all()
//!                                │  registry        │ ──────────────────────→ observers
//!                                └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Kind isolation:** a handler only ever sees events of the kind it
//!   subscribed to.
//! - **Priority order:** handlers are invoked in descending priority, ties in
//!   subscription order.
//! - **Failure isolation:** a failing or panicking handler never affects its
//!   siblings or the publisher.
//! - **Idempotent cancellation:** unsubscribing twice is a no-op.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dispatch_bus::{Dispatcher, SubscribeOptions};
//!
//! let dispatcher = Dispatcher::<AppEvent>::new();
//! let handle = dispatcher.subscribe(
//!     AppEventKind::Login,
//!     |event| async move {
//!         tracing::info!(payload = ?event.payload(), "login");
//!         Ok(())
//!     },
//!     SubscribeOptions::new().priority(10),
//! )?;
//!
//! dispatcher.fire(AppEvent::Login { user: "alice".into() }).await?;
//! handle.cancel();
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod observer;
pub mod ports;


// Re-export main types
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use domain::{
    handler_fn, CancelReason, DeliveryReport, DispatchError, DispatchEvent, Event, EventHandler,
    EventId, EventPredicate, HandlerError, HandlerFailure, InterceptorChain, InterceptorError,
    InterceptorId, KindStatistics, PublishOutcome, StatisticsSnapshot, SubscribeOptions,
    SubscriptionHandle, SubscriptionId, SubscriptionRegistry, SubscriptionState, Timestamp,
};
pub use observer::{ObservationFilter, ObservationStream};
pub use ports::{EventDispatcherApi, InterceptDecision, Interceptor, SystemTimeSource, TimeSource};

/// Events buffered per observer before the slowest one starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Priority given to subscriptions that don't set one.
pub const DEFAULT_PRIORITY: i32 = 0;
