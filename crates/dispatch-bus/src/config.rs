//! Dispatcher configuration.

use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_PRIORITY};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Events buffered per observer before the slowest starts lagging.
    pub observation_capacity: usize,

    /// Whether events stopped by an interceptor still reach the observation
    /// stream.
    pub observe_aborted: bool,

    /// Deadline for a single handler invocation. `None` waits indefinitely.
    pub handler_timeout: Option<Duration>,

    /// Priority used when `SubscribeOptions` does not set one.
    pub default_priority: i32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            observation_capacity: DEFAULT_CHANNEL_CAPACITY,
            observe_aborted: false,
            handler_timeout: None,
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl DispatcherConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DISPATCH_OBSERVATION_CAPACITY`: Observer buffer size (default: 1000)
    /// - `DISPATCH_OBSERVE_ABORTED`: Broadcast aborted events (default: false)
    /// - `DISPATCH_HANDLER_TIMEOUT_MS`: Per-handler deadline (default: none)
    /// - `DISPATCH_DEFAULT_PRIORITY`: Default subscription priority (default: 0)
    ///
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            observation_capacity: parse_var("DISPATCH_OBSERVATION_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.observation_capacity),
            observe_aborted: parse_var("DISPATCH_OBSERVE_ABORTED")
                .unwrap_or(defaults.observe_aborted),
            handler_timeout: parse_var::<u64>("DISPATCH_HANDLER_TIMEOUT_MS")
                .map(Duration::from_millis)
                .or(defaults.handler_timeout),
            default_priority: parse_var("DISPATCH_DEFAULT_PRIORITY")
                .unwrap_or(defaults.default_priority),
        }
    }

    #[must_use]
    pub fn with_observation_capacity(mut self, capacity: usize) -> Self {
        self.observation_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_observe_aborted(mut self, observe_aborted: bool) -> Self {
        self.observe_aborted = observe_aborted;
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}
