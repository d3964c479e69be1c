//! # Statistics
//!
//! Read-only view of subscription counts and dispatch activity.
//!
//! Counters live next to each kind's subscription list and are updated with
//! relaxed atomics, so recording never takes the registry write lock and
//! taking a snapshot never blocks a publish. A snapshot is consistent per
//! kind, not across kinds.

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why a subscription left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicit `unsubscribe`, `unsubscribe_all` or handle cancel.
    Unsubscribed,
    /// The configured timeout elapsed.
    Expired,
    /// The handler failed and the subscription had `remove_on_error` set.
    HandlerError,
    /// The dispatcher was disposed.
    Disposed,
}

/// Activity counters for one event kind.
#[derive(Debug, Default)]
pub(crate) struct KindCounters {
    registered: AtomicU64,
    published: AtomicU64,
    handler_failures: AtomicU64,
    filter_rejections: AtomicU64,
    filter_errors: AtomicU64,
    removed_on_error: AtomicU64,
    expired: AtomicU64,
}

impl KindCounters {
    pub(crate) fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filter_rejection(&self) {
        self.filter_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filter_error(&self) {
        self.filter_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self, reason: CancelReason) {
        match reason {
            CancelReason::HandlerError => {
                self.removed_on_error.fetch_add(1, Ordering::Relaxed);
            }
            CancelReason::Expired => {
                self.expired.fetch_add(1, Ordering::Relaxed);
            }
            CancelReason::Unsubscribed | CancelReason::Disposed => {}
        }
    }

    pub(crate) fn to_statistics(&self, active_count: usize) -> KindStatistics {
        KindStatistics {
            active_count,
            total_count: self.registered.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            filter_rejections: self.filter_rejections.load(Ordering::Relaxed),
            filter_errors: self.filter_errors.load(Ordering::Relaxed),
            removed_on_error: self.removed_on_error.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for a single event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindStatistics {
    /// Subscriptions currently able to receive events.
    pub active_count: usize,
    /// Subscriptions ever registered for this kind.
    pub total_count: u64,
    /// Events of this kind that reached fan-out.
    pub published: u64,
    /// Handler invocations that failed, panicked or timed out.
    pub handler_failures: u64,
    /// Deliveries skipped because a filter rejected the event.
    pub filter_rejections: u64,
    /// Deliveries skipped because a filter panicked.
    pub filter_errors: u64,
    /// Subscriptions cancelled by their `remove_on_error` policy.
    pub removed_on_error: u64,
    /// Subscriptions cancelled by their timeout.
    pub expired: u64,
}

/// Point-in-time statistics for a dispatcher.
#[derive(Debug, Clone, Serialize)]
#[serde(bound(serialize = "K: Serialize + Eq + Hash"))]
pub struct StatisticsSnapshot<K> {
    /// Per-kind statistics, for every kind ever subscribed to or published.
    pub kinds: HashMap<K, KindStatistics>,
    /// Publishes that passed the interceptor chain.
    pub events_published: u64,
    /// Publishes stopped by an interceptor.
    pub events_aborted: u64,
    /// Registered interceptors.
    pub interceptors: usize,
}

impl<K: Eq + Hash> StatisticsSnapshot<K> {
    /// Statistics for one kind, if it has ever been seen.
    #[must_use]
    pub fn get(&self, kind: &K) -> Option<&KindStatistics> {
        self.kinds.get(kind)
    }

    /// Active subscription count for a kind, zero when unseen.
    #[must_use]
    pub fn active_count(&self, kind: &K) -> usize {
        self.kinds.get(kind).map_or(0, |stats| stats.active_count)
    }

    /// Active subscriptions across all kinds.
    #[must_use]
    pub fn total_active(&self) -> usize {
        self.kinds.values().map(|stats| stats.active_count).sum()
    }
}
