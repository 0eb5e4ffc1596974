mod loader;
mod root;
mod telemetry;

pub use loader::load_from_path;
pub use root::Config;
pub use telemetry::{LoggingConfig, TelemetryConfig};
