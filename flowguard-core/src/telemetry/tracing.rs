use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Initialize structured logging. `log_level` may already include a
/// `RUST_LOG`-style override from the caller; `otel_log_level` scopes down
/// the separately-noisy `opentelemetry` crate target.
pub fn init_tracing(
    log_level: &str,
    show_target: bool,
    otel_log_level: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter_str = format!("{log_level},opentelemetry={otel_log_level}");
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter_str));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(show_target);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("failed to set global tracing subscriber: {e}"))?;

    Ok(())
}

/// Flushes stdout/stderr so buffered logs aren't lost on shutdown.
pub fn shutdown_tracing() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}
