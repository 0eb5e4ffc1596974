use std::net::SocketAddr;
use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// Prometheus counters/gauges for the packet pipeline (C11).
#[derive(Clone)]
pub struct PipelineMetrics {
    pub packets_processed_total: Counter<u64>,
    pub packets_allowed_total: Counter<u64>,
    pub packets_blocked_total: Counter<u64>,
    pub packets_parse_errors_total: Counter<u64>,
    pub packets_dropped_backpressure_total: Counter<u64>,
    pub ban_errors_total: Counter<u64>,
    pub cleanup_sweep_duration_seconds: opentelemetry::metrics::Histogram<f64>,
    pub active_bans: UpDownCounter<i64>,
}

impl PipelineMetrics {
    fn new(meter: Meter) -> Self {
        Self {
            packets_processed_total: meter
                .u64_counter("flowguard_packets_processed_total")
                .with_description("Total packets passed through the pipeline")
                .build(),
            packets_allowed_total: meter
                .u64_counter("flowguard_packets_allowed_total")
                .with_description("Packets classified as not BitTorrent")
                .build(),
            packets_blocked_total: meter
                .u64_counter("flowguard_packets_blocked_total")
                .with_description("Packets classified as BitTorrent, by reason")
                .build(),
            packets_parse_errors_total: meter
                .u64_counter("flowguard_packets_parse_errors_total")
                .with_description("Packets that failed L3/L4 parsing (fail-open)")
                .build(),
            packets_dropped_backpressure_total: meter
                .u64_counter("flowguard_packets_dropped_backpressure_total")
                .with_description("Packets dropped because the worker queue was full")
                .build(),
            ban_errors_total: meter
                .u64_counter("flowguard_ban_errors_total")
                .with_description("Failed attempts to insert a ban into the kernel map")
                .build(),
            cleanup_sweep_duration_seconds: meter
                .f64_histogram("flowguard_cleanup_sweep_duration_seconds")
                .with_description("Duration of each ban-manager expiry sweep")
                .build(),
            active_bans: meter
                .i64_up_down_counter("flowguard_active_bans")
                .with_description("Current number of banned source IPs")
                .build(),
        }
    }
}

pub fn init_metrics() -> Result<(Arc<PipelineMetrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter().with_registry(registry.clone()).build()?;
    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();
    global::set_meter_provider(meter_provider);

    let meter = global::meter("flowguard");
    Ok((Arc::new(PipelineMetrics::new(meter)), registry))
}

/// Serves a single `/metrics` endpoint until SIGINT/SIGTERM. No framework
/// dependency: one endpoint doesn't need a full HTTP stack, just enough of
/// the wire format to be Prometheus-scrapeable.
pub async fn start_metrics_server(
    port: u16,
    registry: Registry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(?addr, "metrics server started");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("failed to install SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("failed to install SIGINT handler: {e}")))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("metrics server: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("metrics server: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (mut stream, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "metrics server: accept error");
                        continue;
                    }
                };
                let registry = registry.clone();
                tokio::spawn(async move {
                    let response = encode_metrics_response(&registry);
                    if let Err(e) = stream.write_all(&response).await {
                        warn!(?peer, error = %e, "metrics server: write error");
                    }
                });
            }
        }
    }

    info!("metrics server stopped");
    Ok(())
}

fn encode_metrics_response(registry: &Registry) -> Vec<u8> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut body = Vec::new();
    if encoder.encode(&metric_families, &mut body).is_err() {
        return b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n".to_vec();
    }

    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        encoder.format_type(),
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(&body);
    response
}
