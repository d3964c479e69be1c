//! Session handlers and the maintenance gate.
//!
//! Each handler owns its state behind a lock and exposes a `handle_*` method
//! the container wraps into a subscription closure.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dispatch_bus::{Event, HandlerError, InterceptDecision, Interceptor, InterceptorError};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::events::{SessionEvent, SessionEventKind, SyncStatus};

/// Tracks which users are logged in.
#[derive(Debug, Default)]
pub struct SessionTracker {
    active: RwLock<BTreeSet<String>>,
}

impl SessionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a login or logout.
    ///
    /// # Errors
    ///
    /// Logging out a user without a session is reported as a failure.
    pub fn handle(&self, event: &Event<SessionEvent>) -> Result<(), HandlerError> {
        match event.payload() {
            SessionEvent::Login { user } => {
                if !self.active.write().insert(user.clone()) {
                    warn!(user = %user, "Duplicate login, session already active");
                }
                Ok(())
            }
            SessionEvent::Logout { user } => {
                if self.active.write().remove(user) {
                    Ok(())
                } else {
                    Err(HandlerError::failed(format!("no active session for {user}")))
                }
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn active_users(&self) -> Vec<String> {
        self.active.read().iter().cloned().collect()
    }

    #[must_use]
    pub fn is_active(&self, user: &str) -> bool {
        self.active.read().contains(user)
    }
}

/// Totals for completed syncs.
#[derive(Debug, Default)]
pub struct SyncLedger {
    completed: AtomicU64,
    items: AtomicU64,
}

impl SyncLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &Event<SessionEvent>) {
        if let SessionEvent::Sync { items, .. } = event.payload() {
            self.completed.fetch_add(1, Ordering::Relaxed);
            self.items.fetch_add(u64::from(*items), Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }
}

/// Relays sync failures to an operator channel that may be down.
///
/// Returns an error while the channel is unreachable; the container subscribes
/// it with `remove_on_error` so one outage detaches it for good.
#[derive(Debug, Default)]
pub struct FailureNotifier {
    reachable: AtomicBool,
    notified: AtomicU64,
}

impl FailureNotifier {
    #[must_use]
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            notified: AtomicU64::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// # Errors
    ///
    /// Fails when the operator channel is unreachable.
    pub fn notify(&self, event: &Event<SessionEvent>) -> Result<(), HandlerError> {
        if !self.reachable.load(Ordering::Acquire) {
            return Err(HandlerError::failed("operator channel unreachable"));
        }
        self.notified.fetch_add(1, Ordering::Relaxed);
        info!(event_id = %event.id(), "Sync failure reported to operators");
        Ok(())
    }

    #[must_use]
    pub fn notified(&self) -> u64 {
        self.notified.load(Ordering::Relaxed)
    }
}

/// Returns true for syncs that finished successfully.
pub fn is_completed_sync(event: &Event<SessionEvent>) -> bool {
    matches!(
        event.payload(),
        SessionEvent::Sync {
            status: SyncStatus::Completed,
            ..
        }
    )
}

/// Returns true for syncs that failed.
pub fn is_failed_sync(event: &Event<SessionEvent>) -> bool {
    matches!(
        event.payload(),
        SessionEvent::Sync {
            status: SyncStatus::Failed,
            ..
        }
    )
}

/// Aborts sync events while maintenance mode is on.
#[derive(Debug, Default)]
pub struct MaintenanceGate {
    enabled: AtomicBool,
}

impl MaintenanceGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        info!(enabled, "Maintenance mode toggled");
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Interceptor<SessionEvent> for MaintenanceGate {
    fn name(&self) -> &str {
        "maintenance-gate"
    }

    async fn before_publish(
        &self,
        event: &Event<SessionEvent>,
    ) -> Result<InterceptDecision, InterceptorError> {
        if self.is_enabled() && event.kind() == SessionEventKind::Sync {
            return Ok(InterceptDecision::Abort);
        }
        Ok(InterceptDecision::Continue)
    }
}
