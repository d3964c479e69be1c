//! # Interceptor Chain
//!
//! Ordered list of before/after hooks run around every publish. Before-hooks
//! and after-hooks both run in registration order.
//!
//! A publish works on a [`ChainSnapshot`] taken when it starts, so adding or
//! removing interceptors never affects a publish already in flight. The
//! snapshot also remembers how many before-hooks ran, so only those
//! interceptors are told how the publish settled.

use super::errors::DispatchError;
use super::event::{DispatchEvent, Event};
use super::outcome::PublishOutcome;
use crate::ports::outbound::{InterceptDecision, Interceptor};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Identifier returned by `add_interceptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(u64);

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interceptor-{}", self.0)
    }
}

struct ChainState<E: DispatchEvent> {
    entries: Vec<(InterceptorId, Arc<dyn Interceptor<E>>)>,
    next_id: u64,
}

/// Registered interceptors in execution order.
pub struct InterceptorChain<E: DispatchEvent> {
    state: RwLock<ChainState<E>>,
}

impl<E: DispatchEvent> InterceptorChain<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ChainState {
                entries: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Append an interceptor to the end of the chain.
    pub fn add(&self, interceptor: Arc<dyn Interceptor<E>>) -> InterceptorId {
        let mut state = self.state.write();
        state.next_id += 1;
        let id = InterceptorId(state.next_id);
        debug!(interceptor = interceptor.name(), id = %id, "Interceptor added");
        state.entries.push((id, interceptor));
        id
    }

    /// Remove an interceptor. Returns `false` if it was not registered.
    pub fn remove(&self, id: InterceptorId) -> bool {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|(existing, _)| *existing != id);
        before != state.entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the current chain for one publish.
    #[must_use]
    pub fn snapshot(&self) -> ChainSnapshot<E> {
        ChainSnapshot {
            interceptors: self
                .state
                .read()
                .entries
                .iter()
                .map(|(_, interceptor)| Arc::clone(interceptor))
                .collect(),
            entered: AtomicUsize::new(0),
        }
    }
}

impl<E: DispatchEvent> Default for InterceptorChain<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// The interceptors in effect for one publish.
pub struct ChainSnapshot<E: DispatchEvent> {
    interceptors: Vec<Arc<dyn Interceptor<E>>>,
    /// Interceptors whose before-hook has been called.
    entered: AtomicUsize,
}

impl<E: DispatchEvent> ChainSnapshot<E> {
    /// Run before-hooks in order, stopping at the first abort or error.
    ///
    /// Returns the name of the aborting interceptor, if any.
    pub async fn run_before(&self, event: &Event<E>) -> Result<Option<String>, DispatchError> {
        for (position, interceptor) in self.interceptors.iter().enumerate() {
            self.entered.store(position + 1, Ordering::Release);
            let decision = interceptor.before_publish(event).await.map_err(|source| {
                DispatchError::Interceptor {
                    interceptor: interceptor.name().to_string(),
                    source,
                }
            })?;

            if decision == InterceptDecision::Abort {
                return Ok(Some(interceptor.name().to_string()));
            }
        }
        Ok(None)
    }

    /// Run after-hooks in registration order, stopping at the first error.
    pub async fn run_after(&self, event: &Event<E>) -> Result<(), DispatchError> {
        for interceptor in &self.interceptors {
            interceptor.after_publish(event).await.map_err(|source| {
                DispatchError::Interceptor {
                    interceptor: interceptor.name().to_string(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Report the final result to every interceptor whose before-hook ran.
    pub fn settle(&self, event: &Event<E>, result: &Result<PublishOutcome, DispatchError>) {
        let entered = self.entered.load(Ordering::Acquire);
        for interceptor in &self.interceptors[..entered] {
            interceptor.on_settled(event, result);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}
