//! Prometheus metrics for event dispatch.
//!
//! All metrics follow the naming convention: `dispatch_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: events published / aborted, interceptor failures
//! - **Histogram**: publish duration from first before-hook to after-hook

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Events fanned out to subscribers, by kind
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("dispatch_events_published_total", "Events delivered to subscribers"),
        &["kind"]
    ).expect("metric creation failed");

    /// Events stopped by an interceptor, by kind
    pub static ref EVENTS_ABORTED: CounterVec = CounterVec::new(
        Opts::new("dispatch_events_aborted_total", "Events aborted by an interceptor"),
        &["kind"]
    ).expect("metric creation failed");

    /// Publish duration histogram
    pub static ref PUBLISH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "dispatch_publish_duration_seconds",
            "Time from the first before-hook to the after-hook of a publish"
        ).buckets(exponential_buckets(0.00001, 2.0, 18).expect("bucket creation failed"))
    ).expect("metric creation failed");

    /// Publishes that failed inside an interceptor
    pub static ref INTERCEPTOR_ERRORS: IntCounter = IntCounter::new(
        "dispatch_interceptor_errors_total",
        "Publishes abandoned because an interceptor failed"
    ).expect("metric creation failed");
}

/// Register all dispatch metrics with the global registry.
///
/// Calling this more than once is harmless.
///
/// # Errors
///
/// Fails if a metric with a conflicting descriptor is already registered.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(EVENTS_ABORTED.clone()),
        Box::new(PUBLISH_DURATION.clone()),
        Box::new(INTERCEPTOR_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all registered metrics in the Prometheus text format.
///
/// # Errors
///
/// Fails if encoding fails.
pub fn gather() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
