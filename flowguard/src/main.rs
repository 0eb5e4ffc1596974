mod capture;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use flowguard_core::error::{ClassifierError, Result};
use flowguard_core::telemetry::{init_metrics, start_metrics_server};
use flowguard_core::{
    load_from_path, AnalyzerThresholds, BanManager, BlocklistMap, PacketPipeline, PipelineConfig,
};
use flowguard_ebpf::{BlocklistMapHandle, KernelBlocklistMap};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How often userspace republishes the wall-clock second the XDP hook reads
/// to evaluate blocklist entry freshness (§4.6a).
const CLOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(author, version, about = "BitTorrent DPI classifier with kernel-enforced blocking")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, value_name = "FILE", default_value = "config/classifier.toml")]
    config: PathBuf,
}

/// Broadcasts blocklist writes to every attached interface's XDP map. Reads
/// are served from the first handle; all handles are kept in lock-step by
/// `put`/`delete`, so any one of them is representative.
struct MultiInterfaceBlocklist(Vec<KernelBlocklistMap>);

impl BlocklistMap for MultiInterfaceBlocklist {
    fn put(&self, ip: Ipv4Addr, expires_at: u64) -> Result<()> {
        for handle in &self.0 {
            handle.put(ip, expires_at)?;
        }
        Ok(())
    }

    fn delete(&self, ip: Ipv4Addr) -> Result<()> {
        for handle in &self.0 {
            handle.delete(ip)?;
        }
        Ok(())
    }

    fn lookup(&self, ip: Ipv4Addr) -> Option<u64> {
        self.0.first()?.lookup(ip)
    }
}

impl MultiInterfaceBlocklist {
    /// Publishes the current wall-clock second to every attached interface's
    /// `CURRENT_TIME` map so the XDP hook's `expires_at > now` check sees a
    /// live clock instead of the zero-initialized default.
    fn set_clock(&self, now: u64) -> Result<()> {
        for handle in &self.0 {
            handle.set_clock(now)?;
        }
        Ok(())
    }
}

/// Spawns a task that republishes the wall-clock second on `interval` for as
/// long as it runs; aborted at shutdown alongside the other background tasks.
fn spawn_clock_refresh(blocklist: Arc<MultiInterfaceBlocklist>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
            if let Err(e) = blocklist.set_clock(now) {
                warn!(error = %e, "failed to refresh kernel clock");
            }
        }
    })
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration from {:?}: {e}", cli.config);
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(e) =
        flowguard_core::telemetry::init_tracing(&cfg.logging.level, cfg.logging.show_target, &cfg.telemetry.otel_log_level)
    {
        eprintln!("failed to initialize tracing: {e}");
        return std::process::ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cfg));
    flowguard_core::telemetry::shutdown_tracing();

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cfg: flowguard_core::Config) -> Result<()> {
    info!(interfaces = ?cfg.interfaces, monitor_only = cfg.monitor_only, "starting flowguard");

    let mut handles = Vec::with_capacity(cfg.interfaces.len());
    for interface in &cfg.interfaces {
        let handle = BlocklistMapHandle::load(interface)
            .map_err(|e| ClassifierError::Init(format!("failed to attach to {interface}: {e}")))?;
        handles.push(KernelBlocklistMap::new(handle));
    }
    let blocklist = Arc::new(MultiInterfaceBlocklist(handles));

    let ban_manager = Arc::new(BanManager::new(Arc::clone(&blocklist) as Arc<dyn BlocklistMap>));
    let cleanup_interval = Duration::from_secs(cfg.cleanup_interval_secs);
    let cleanup_task = ban_manager.start_periodic_cleanup(cleanup_interval);
    let clock_task = spawn_clock_refresh(Arc::clone(&blocklist), CLOCK_REFRESH_INTERVAL);

    let (metrics, metrics_registry) = match init_metrics() {
        Ok(pair) => (Some(pair.0), Some(pair.1)),
        Err(e) => {
            warn!(error = %e, "failed to initialize metrics, continuing without them");
            (None, None)
        }
    };

    let mut metrics_server = None;
    if let (Some(port), Some(registry)) = (cfg.telemetry.metrics_port, metrics_registry) {
        metrics_server = Some(tokio::spawn(start_metrics_server(port, registry)));
    }

    let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4) * 2;
    let pipeline_config = PipelineConfig {
        whitelist_ports: Arc::new(cfg.whitelist_ports.iter().copied().collect::<HashSet<u16>>()),
        thresholds: AnalyzerThresholds {
            min_payload_size: cfg.min_payload_size as usize,
            entropy_threshold: cfg.entropy_threshold,
        },
        ban_duration: Duration::from_secs(cfg.ban_duration_secs),
        monitor_only: cfg.monitor_only,
    };

    let pipeline = Arc::new(PacketPipeline::spawn(
        worker_count,
        pipeline_config,
        Arc::clone(&ban_manager),
        None,
        metrics.clone(),
    ));

    capture::spawn_capture_threads(&cfg.interfaces, Arc::clone(&pipeline), metrics.clone());

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining pipeline");

    ban_manager.stop_periodic_cleanup();
    cleanup_task.abort();
    clock_task.abort();
    if let Some(server) = metrics_server {
        server.abort();
    }

    match Arc::try_unwrap(pipeline) {
        Ok(pipeline) => pipeline.shutdown().await,
        Err(_) => warn!("pipeline still referenced at shutdown, skipping graceful drain"),
    }

    drop(ban_manager);
    info!("flowguard stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}
