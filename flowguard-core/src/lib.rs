#![forbid(unsafe_code)]

pub mod analyzer;
pub mod ban_manager;
pub mod blocklist;
pub mod config;
pub mod detectors;
pub mod entropy;
pub mod error;
pub mod pipeline;
pub mod signatures;
pub mod socks;
pub mod telemetry;

pub use analyzer::{analyze, AnalyzerThresholds, ReasonTag, Transport, Verdict};
pub use ban_manager::BanManager;
pub use blocklist::{BlocklistMap, InMemoryBlocklistMap};
pub use config::{load_from_path, Config, LoggingConfig, TelemetryConfig};
pub use error::{ClassifierError, Result};
pub use pipeline::{parse_ethernet_ipv4, process_frame, PacketDescriptor, PacketPipeline, PipelineConfig};
