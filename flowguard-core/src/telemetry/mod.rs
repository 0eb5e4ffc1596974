pub mod detection_log;
pub mod metrics;
pub mod tracing;

pub use detection_log::{DetectionLogSink, DetectionRecord, JsonLinesSink};
pub use metrics::{init_metrics, start_metrics_server, PipelineMetrics};
pub use tracing::{init_tracing, shutdown_tracing};
