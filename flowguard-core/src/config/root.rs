use serde::Deserialize;

use crate::signatures::DEFAULT_WHITELIST_PORTS;

use super::telemetry::{LoggingConfig, TelemetryConfig};

/// Top-level configuration, loaded from TOML via [`super::load_from_path`].
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// NFQUEUE queue number the capture layer binds to. Meaningful only to
    /// the external capture adapter; the core never opens the queue itself.
    #[serde(default = "default_queue_num")]
    pub queue_num: u16,
    /// Shannon-entropy threshold (bits/byte) above which a TCP payload is
    /// treated as MSE/PE-obfuscated. Must be within `[0.0, 8.0]`.
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,
    /// Minimum payload length (bytes) considered for classification.
    #[serde(default = "default_min_payload_size")]
    pub min_payload_size: u32,
    /// Name of the external ipset the host deployment may sync the
    /// blocklist into. Opaque to the core; carried through for the
    /// NFQUEUE+ipset external adapter described in §9.
    #[serde(default = "default_ipset_name")]
    pub ipset_name: String,
    /// How long a ban lasts before the cleanup sweep removes it.
    #[serde(default = "default_ban_duration_secs")]
    pub ban_duration_secs: u64,
    /// Network interfaces the capture layer (and, for the eBPF reference
    /// backend, the XDP program) attaches to. Must be non-empty.
    pub interfaces: Vec<String>,
    /// Ports never subjected to classification.
    #[serde(default = "default_whitelist_ports")]
    pub whitelist_ports: Vec<u16>,
    /// When true, the pipeline still emits detection log records but never
    /// calls `ban()` — useful for dry-running the classifier in production.
    #[serde(default)]
    pub monitor_only: bool,
    /// Interval between ban-manager expiry sweeps.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Bound on the number of concurrently banned source IPs.
    #[serde(default = "default_blocklist_capacity")]
    pub blocklist_capacity: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_queue_num() -> u16 {
    0
}
fn default_entropy_threshold() -> f64 {
    7.6
}
fn default_min_payload_size() -> u32 {
    60
}
fn default_ipset_name() -> String {
    "flowguard-blocklist".to_string()
}
fn default_ban_duration_secs() -> u64 {
    3600
}
fn default_whitelist_ports() -> Vec<u16> {
    DEFAULT_WHITELIST_PORTS.to_vec()
}
fn default_cleanup_interval_secs() -> u64 {
    30
}
fn default_blocklist_capacity() -> u32 {
    100_000
}
