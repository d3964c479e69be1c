//! # Dispatch Telemetry
//!
//! Logging and metrics for processes built on `dispatch-bus`.
//!
//! ## Components
//!
//! - **Logging:** `tracing-subscriber` registry with an `EnvFilter` and a
//!   pretty or JSON formatter
//! - **Metrics:** Prometheus counters and histograms for publish activity
//! - **Interceptors:** `TracingInterceptor` and `MetricsInterceptor`, plugged
//!   into a dispatcher like any other interceptor
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dispatch_telemetry::{init_telemetry, MetricsInterceptor, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! dispatcher.add_interceptor(Arc::new(MetricsInterceptor::new()))?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DISPATCH_SERVICE_NAME` | `dispatch` | Service name in log output |
//! | `DISPATCH_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `DISPATCH_JSON_LOGS` | `false` | Emit JSON lines instead of pretty output |
//! | `DISPATCH_CONSOLE_OUTPUT` | `true` | Write logs to stdout at all |
//! | `DISPATCH_METRICS_ENABLED` | `true` | Register Prometheus metrics |

mod config;
mod interceptors;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use interceptors::{MetricsInterceptor, TracingInterceptor};
pub use logging::init_logging;
pub use metrics::{
    gather, register_metrics, EVENTS_ABORTED, EVENTS_PUBLISHED, INTERCEPTOR_ERRORS,
    PUBLISH_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, when enabled, the metrics registry.
///
/// Returns a guard that should be held for the lifetime of the application.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or metric registration
/// fails.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.metrics_enabled {
        register_metrics()?;
    }

    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        metrics_enabled = config.metrics_enabled,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { config })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    config: TelemetryConfig,
}

impl TelemetryGuard {
    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.config.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
