//! # Subscription Registry
//!
//! Per-kind ordered collection of active subscriptions.
//!
//! ## Data Structures
//!
//! - `kinds`: subscriptions per kind, kept in non-increasing priority order,
//!   ties in registration order
//! - `index`: O(1) lookup from subscription id to its kind
//!
//! ## Invariants
//!
//! - Every list is sorted by `(priority desc, id asc)` after every insert/remove
//! - A subscription is in `index` iff it is in its kind's list
//! - Cancelled subscriptions are pruned immediately; removing twice is a no-op
//!
//! Dispatch never iterates the live lists. [`SubscriptionRegistry::snapshot`]
//! copies the `Arc`s out under a read lock, so concurrent subscribe and
//! unsubscribe calls cannot disturb an in-flight fan-out.

use super::event::DispatchEvent;
use super::statistics::{CancelReason, KindCounters, KindStatistics};
use super::subscription::{Subscription, SubscriptionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

struct KindEntry<E: DispatchEvent> {
    subscriptions: Vec<Arc<Subscription<E>>>,
    counters: Arc<KindCounters>,
}

impl<E: DispatchEvent> Default for KindEntry<E> {
    fn default() -> Self {
        Self {
            subscriptions: Vec::new(),
            counters: Arc::new(KindCounters::default()),
        }
    }
}

struct RegistryState<E: DispatchEvent> {
    kinds: HashMap<E::Kind, KindEntry<E>>,
    index: HashMap<SubscriptionId, E::Kind>,
    next_id: u64,
}

/// Copy of one kind's subscriptions taken at a single instant.
pub(crate) struct RegistrySnapshot<E: DispatchEvent> {
    /// Active subscriptions in invocation order.
    pub(crate) subscriptions: Vec<Arc<Subscription<E>>>,
    /// Subscriptions whose timeout elapsed but whose timer has not fired yet.
    pub(crate) expired: Vec<SubscriptionId>,
    pub(crate) counters: Arc<KindCounters>,
}

/// Registry of subscriptions keyed by event kind.
pub struct SubscriptionRegistry<E: DispatchEvent> {
    state: RwLock<RegistryState<E>>,
}

impl<E: DispatchEvent> SubscriptionRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                kinds: HashMap::new(),
                index: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Register a subscription built from a freshly assigned id.
    ///
    /// The id is allocated under the write lock, so id order always matches
    /// registration order. O(log n) search plus O(n) shift.
    pub(crate) fn register<F>(&self, build: F) -> Arc<Subscription<E>>
    where
        F: FnOnce(SubscriptionId) -> Subscription<E>,
    {
        let mut state = self.state.write();
        state.next_id += 1;
        let subscription = Arc::new(build(SubscriptionId::new(state.next_id)));
        let id = subscription.id();
        let kind = subscription.kind();

        let entry = state.kinds.entry(kind).or_default();
        // Equal priorities stay behind earlier registrations.
        let position = entry
            .subscriptions
            .partition_point(|existing| existing.priority() >= subscription.priority());
        entry.subscriptions.insert(position, Arc::clone(&subscription));
        entry.counters.record_registered();

        state.index.insert(id, kind);
        subscription
    }

    /// Copy out the currently active subscriptions for `kind`.
    pub(crate) fn snapshot(&self, kind: E::Kind, now: Instant) -> RegistrySnapshot<E> {
        {
            let state = self.state.read();
            if let Some(entry) = state.kinds.get(&kind) {
                return Self::split_expired(entry, now);
            }
        }

        // First sighting of this kind: create the entry so its activity is counted.
        let mut state = self.state.write();
        let entry = state.kinds.entry(kind).or_default();
        Self::split_expired(entry, now)
    }

    fn split_expired(entry: &KindEntry<E>, now: Instant) -> RegistrySnapshot<E> {
        let mut subscriptions = Vec::with_capacity(entry.subscriptions.len());
        let mut expired = Vec::new();

        for subscription in &entry.subscriptions {
            if subscription.has_expired(now) {
                expired.push(subscription.id());
            } else if subscription.is_active_at(now) {
                subscriptions.push(Arc::clone(subscription));
            }
        }

        RegistrySnapshot {
            subscriptions,
            expired,
            counters: Arc::clone(&entry.counters),
        }
    }

    /// Cancel and detach one subscription.
    ///
    /// Returns `false` when the id is unknown or already removed.
    pub fn remove(&self, id: SubscriptionId, reason: CancelReason) -> bool {
        let mut state = self.state.write();

        let Some(kind) = state.index.remove(&id) else {
            return false;
        };
        let Some(entry) = state.kinds.get_mut(&kind) else {
            return false;
        };
        let Some(position) = entry.subscriptions.iter().position(|s| s.id() == id) else {
            return false;
        };

        let subscription = entry.subscriptions.remove(position);
        subscription.deactivate();
        entry.counters.record_cancelled(reason);

        debug!(subscription_id = %id, kind = ?kind, reason = ?reason, "Subscription cancelled");
        true
    }

    /// Cancel every subscription for `kind`. Returns how many were cancelled.
    pub fn remove_all(&self, kind: E::Kind, reason: CancelReason) -> usize {
        let mut state = self.state.write();
        let RegistryState { kinds, index, .. } = &mut *state;

        let Some(entry) = kinds.get_mut(&kind) else {
            return 0;
        };

        let removed = entry.subscriptions.len();
        for subscription in entry.subscriptions.drain(..) {
            index.remove(&subscription.id());
            subscription.deactivate();
            entry.counters.record_cancelled(reason);
        }

        debug!(kind = ?kind, removed, reason = ?reason, "Subscriptions cancelled");
        removed
    }

    /// Cancel every subscription of every kind.
    pub fn clear(&self, reason: CancelReason) -> usize {
        let mut state = self.state.write();
        let RegistryState { kinds, index, .. } = &mut *state;

        let mut removed = 0;
        for entry in kinds.values_mut() {
            for subscription in entry.subscriptions.drain(..) {
                subscription.deactivate();
                entry.counters.record_cancelled(reason);
                removed += 1;
            }
        }
        index.clear();
        removed
    }

    /// Whether `id` is registered and still able to receive events.
    #[must_use]
    pub fn is_active(&self, id: SubscriptionId) -> bool {
        let state = self.state.read();
        let now = Instant::now();
        state
            .index
            .get(&id)
            .and_then(|kind| state.kinds.get(kind))
            .and_then(|entry| entry.subscriptions.iter().find(|s| s.id() == id))
            .is_some_and(|subscription| subscription.is_active_at(now))
    }

    /// Active subscriptions for `kind`.
    #[must_use]
    pub fn active_count(&self, kind: E::Kind) -> usize {
        let now = Instant::now();
        self.state.read().kinds.get(&kind).map_or(0, |entry| {
            entry
                .subscriptions
                .iter()
                .filter(|s| s.is_active_at(now))
                .count()
        })
    }

    /// Subscription ids for `kind` in invocation order.
    #[must_use]
    pub fn ordered_ids(&self, kind: E::Kind) -> Vec<SubscriptionId> {
        let now = Instant::now();
        self.state.read().kinds.get(&kind).map_or_else(Vec::new, |entry| {
            entry
                .subscriptions
                .iter()
                .filter(|s| s.is_active_at(now))
                .map(|s| s.id())
                .collect()
        })
    }

    /// Total registered subscriptions across kinds, including expired ones
    /// whose timer has not fired yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-kind statistics, walked under a read lock.
    #[must_use]
    pub fn statistics(&self) -> HashMap<E::Kind, KindStatistics> {
        let state = self.state.read();
        let now = Instant::now();
        state
            .kinds
            .iter()
            .map(|(kind, entry)| {
                let active = entry
                    .subscriptions
                    .iter()
                    .filter(|s| s.is_active_at(now))
                    .count();
                (*kind, entry.counters.to_statistics(active))
            })
            .collect()
    }
}

impl<E: DispatchEvent> Default for SubscriptionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
