//! # Dispatch Container
//!
//! Composition root. Owns the one dispatcher of the process and everything
//! subscribed to it; components get it from here rather than from a static.
//!
//! ## Wiring
//!
//! | Kind | Subscriber | Priority | Options |
//! |------|------------|----------|---------|
//! | Login, Logout | audit log | 100 | |
//! | Login, Logout | session tracker | 10 | |
//! | Sync | sync ledger | 0 | filter: completed |
//! | Sync | failure notifier | 0 | filter: failed, remove on error |
//! | Heartbeat | heartbeat monitor | 0 | timeout: `heartbeat_window` |
//!
//! Interceptors, outermost first: tracing, metrics, maintenance gate.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dispatch_bus::{
    DispatchError, Dispatcher, DispatcherConfig, Interceptor, PublishOutcome,
    SubscribeOptions, SubscriptionHandle,
};
use dispatch_telemetry::{MetricsInterceptor, TracingInterceptor};
use thiserror::Error;
use tracing::{info, warn};

use crate::events::{SessionEvent, SessionEventKind};
use crate::handlers::{
    is_completed_sync, is_failed_sync, FailureNotifier, MaintenanceGate, SessionTracker,
    SyncLedger,
};

/// Errors raised while assembling the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to wire dispatcher: {0}")]
    Wiring(#[from] DispatchError),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub dispatcher: DispatcherConfig,
    /// How long the heartbeat monitor stays subscribed.
    pub heartbeat_window: Duration,
    /// Whether the operator channel is up at startup.
    pub notifier_reachable: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            heartbeat_window: Duration::from_secs(30),
            notifier_reachable: true,
        }
    }
}

impl RuntimeConfig {
    /// Dispatcher settings from the environment, runtime defaults otherwise.
    pub fn from_env() -> Self {
        Self {
            dispatcher: DispatcherConfig::from_env(),
            ..Self::default()
        }
    }
}

/// Container holding the dispatcher and its subscribers.
pub struct DispatchContainer {
    pub dispatcher: Dispatcher<SessionEvent>,
    pub metrics: Arc<MetricsInterceptor>,
    pub gate: Arc<MaintenanceGate>,
    pub sessions: Arc<SessionTracker>,
    pub ledger: Arc<SyncLedger>,
    pub notifier: Arc<FailureNotifier>,
    heartbeats: Arc<AtomicU64>,
    handles: Vec<SubscriptionHandle<SessionEvent>>,
}

impl DispatchContainer {
    /// Build the dispatcher and wire every subscriber.
    ///
    /// Must run inside a tokio runtime: the heartbeat monitor has a timeout.
    ///
    /// # Errors
    ///
    /// Fails if any subscription or interceptor cannot be registered.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let dispatcher = Dispatcher::with_config(config.dispatcher.clone());

        let mut container = Self {
            dispatcher,
            metrics: Arc::new(MetricsInterceptor::new()),
            gate: Arc::new(MaintenanceGate::new()),
            sessions: Arc::new(SessionTracker::new()),
            ledger: Arc::new(SyncLedger::new()),
            notifier: Arc::new(FailureNotifier::new(config.notifier_reachable)),
            heartbeats: Arc::new(AtomicU64::new(0)),
            handles: Vec::new(),
        };

        container.install_interceptors()?;
        container.wire_subscribers(&config)?;

        info!(
            subscriptions = container.handles.len(),
            interceptors = container.dispatcher.interceptor_count(),
            "Dispatch container ready"
        );
        Ok(container)
    }

    fn install_interceptors(&self) -> Result<(), DispatchError> {
        self.dispatcher
            .add_interceptor(Arc::new(TracingInterceptor::new()))?;
        self.dispatcher
            .add_interceptor(Arc::clone(&self.metrics) as Arc<dyn Interceptor<SessionEvent>>)?;
        self.dispatcher
            .add_interceptor(Arc::clone(&self.gate) as Arc<dyn Interceptor<SessionEvent>>)?;
        Ok(())
    }

    fn wire_subscribers(&mut self, config: &RuntimeConfig) -> Result<(), DispatchError> {
        for kind in [SessionEventKind::Login, SessionEventKind::Logout] {
            let audit = self.dispatcher.subscribe(
                kind,
                |event| async move {
                    info!(event_id = %event.id(), payload = ?event.payload(), "audit");
                    Ok(())
                },
                SubscribeOptions::new().priority(100).label("audit"),
            )?;
            self.handles.push(audit);

            let sessions = Arc::clone(&self.sessions);
            let tracker = self.dispatcher.subscribe(
                kind,
                move |event| {
                    let result = sessions.handle(&event);
                    async move { result }
                },
                SubscribeOptions::new().priority(10).label("sessions"),
            )?;
            self.handles.push(tracker);
        }

        let ledger = Arc::clone(&self.ledger);
        let handle = self.dispatcher.subscribe(
            SessionEventKind::Sync,
            move |event| {
                ledger.record(&event);
                async { Ok(()) }
            },
            SubscribeOptions::new()
                .filter(is_completed_sync)
                .label("sync-ledger"),
        )?;
        self.handles.push(handle);

        let notifier = Arc::clone(&self.notifier);
        let handle = self.dispatcher.subscribe(
            SessionEventKind::Sync,
            move |event| {
                let result = notifier.notify(&event);
                async move { result }
            },
            SubscribeOptions::new()
                .filter(is_failed_sync)
                .remove_on_error(true)
                .label("failure-notifier"),
        )?;
        self.handles.push(handle);

        let heartbeats = Arc::clone(&self.heartbeats);
        let handle = self.dispatcher.subscribe(
            SessionEventKind::Heartbeat,
            move |_event| {
                heartbeats.fetch_add(1, Ordering::Relaxed);
                async { Ok(()) }
            },
            SubscribeOptions::new()
                .timeout(config.heartbeat_window)
                .label("heartbeat-monitor"),
        )?;
        self.handles.push(handle);

        Ok(())
    }

    /// Stamp `payload` and publish it through the container's dispatcher.
    ///
    /// # Errors
    ///
    /// Propagates dispatcher errors.
    pub async fn publish(&self, payload: SessionEvent) -> Result<PublishOutcome, DispatchError> {
        self.dispatcher.fire(payload).await
    }

    #[must_use]
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Handles of every wired subscription, in wiring order.
    #[must_use]
    pub fn handles(&self) -> &[SubscriptionHandle<SessionEvent>] {
        &self.handles
    }

    /// Dispose the dispatcher. Every handle becomes inactive.
    ///
    /// # Errors
    ///
    /// Fails if the dispatcher was already disposed.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        info!("Shutting down dispatch container");
        self.dispatcher.dispose()
    }

    /// Await `work`, then shut down whether or not it succeeded.
    ///
    /// The error from `work` wins over a shutdown error.
    ///
    /// # Errors
    ///
    /// Returns the error of `work`, or the shutdown error if `work` succeeded.
    pub async fn shutdown_after<T, Err, W>(&self, work: W) -> Result<T, Err>
    where
        W: Future<Output = Result<T, Err>>,
        Err: From<DispatchError>,
    {
        let outcome = work.await;
        match (outcome, self.shutdown()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) => Err(error.into()),
            (Err(error), shutdown) => {
                if let Err(shutdown_error) = shutdown {
                    warn!(error = %shutdown_error, "Shutdown after failed work also failed");
                }
                Err(error)
            }
        }
    }
}
