use serde::Deserialize;

/// Controls the optional Prometheus metrics endpoint and OpenTelemetry SDK
/// log verbosity.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    /// If set, starts a dedicated HTTP server on this port serving `/metrics`.
    /// Default: `None` (metrics disabled).
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// Verbosity of the `opentelemetry` crate's own internal logs, distinct
    /// from the application log level in `[logging]`.
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}

/// Application-level structured logging (stdout/stderr via `tracing`).
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Can be overridden at runtime via the `RUST_LOG` environment variable.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the module path (`target`) in each log line.
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
