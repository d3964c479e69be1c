//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to log output
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// Whether to format logs as JSON lines
    pub json_logs: bool,

    /// Whether to register Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "dispatch".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DISPATCH_SERVICE_NAME`: Service name (default: dispatch)
    /// - `DISPATCH_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `DISPATCH_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `DISPATCH_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `DISPATCH_METRICS_ENABLED`: Register metrics (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            service_name: env::var("DISPATCH_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("DISPATCH_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            console_output: flag("DISPATCH_CONSOLE_OUTPUT").unwrap_or(defaults.console_output),

            json_logs: flag("DISPATCH_JSON_LOGS").unwrap_or(defaults.json_logs),

            metrics_enabled: flag("DISPATCH_METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Configuration for tests: warnings only, no metrics.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            log_level: "warn".to_string(),
            metrics_enabled: false,
            ..Self::default()
        }
    }
}

fn flag(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            // Logging isn't up yet, so this goes to stderr directly.
            eprintln!("ignoring unparseable value {raw:?} for {name}");
            None
        }
    }
}
