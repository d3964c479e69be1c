//! Event types and helpers shared by the integration tests and benchmarks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dispatch_bus::{DispatchEvent, Event, HandlerError};
use futures::future::{ready, Ready};
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    Login,
    Sync,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Started,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestEvent {
    Login { user: String },
    Sync { status: SyncState },
    Test { n: u64 },
}

impl TestEvent {
    pub fn login(user: &str) -> Self {
        Self::Login {
            user: user.to_string(),
        }
    }
}

impl DispatchEvent for TestEvent {
    type Kind = TestKind;

    fn kind(&self) -> TestKind {
        match self {
            Self::Login { .. } => TestKind::Login,
            Self::Sync { .. } => TestKind::Sync,
            Self::Test { .. } => TestKind::Test,
        }
    }
}

pub type HandlerResult = Ready<Result<(), HandlerError>>;

/// Ordered log of handler invocations.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that appends `name` to the log.
    pub fn handler(
        &self,
        name: &str,
    ) -> impl Fn(Arc<Event<TestEvent>>) -> HandlerResult + Send + Sync + 'static {
        let entries = Arc::clone(&self.entries);
        let name = name.to_string();
        move |_event| {
            entries.lock().push(name.clone());
            ready(Ok(()))
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Invocation counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    calls: Arc<AtomicUsize>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self) -> impl Fn(Arc<Event<TestEvent>>) -> HandlerResult + Send + Sync + 'static {
        let calls = Arc::clone(&self.calls);
        move |_event| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Ok(()))
        }
    }

    /// Handler that counts and then fails.
    pub fn failing_handler(
        &self,
    ) -> impl Fn(Arc<Event<TestEvent>>) -> HandlerResult + Send + Sync + 'static {
        let calls = Arc::clone(&self.calls);
        move |_event| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(Err(HandlerError::failed("always fails")))
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}
