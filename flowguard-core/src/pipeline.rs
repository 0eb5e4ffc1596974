//! Per-packet driver (C8): parses L3/L4 headers from a raw Ethernet frame,
//! applies the whitelist, invokes the analyzer, and acts on the verdict
//! through the ban manager. Fed by a bounded worker pool so a burst of
//! traffic degrades by dropping packets rather than by unbounded queuing.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::analyzer::{analyze, AnalyzerThresholds, Transport, Verdict};
use crate::ban_manager::BanManager;
use crate::telemetry::{DetectionLogSink, DetectionRecord, PipelineMetrics};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_VLAN_QINQ: u16 = 0x88A8;
const ETH_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;

const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

/// Parsed L3/L4 header fields. Built per packet, discarded after the
/// verdict is acted on.
#[derive(Debug, Clone, Copy)]
pub struct PacketDescriptor {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub transport: Transport,
}

/// Parses an Ethernet frame (with up to two stacked VLAN tags) down to an
/// IPv4 + TCP/UDP header, returning the descriptor and a reference to the L4
/// payload. Returns `None` for anything else (IPv6, ARP, truncated frames,
/// other L4 protocols) — callers must treat `None` as "allow, don't inspect".
pub fn parse_ethernet_ipv4(frame: &[u8]) -> Option<(PacketDescriptor, &[u8])> {
    let mut offset = ETH_HEADER_LEN;
    let mut ethertype = u16::from_be_bytes(frame.get(12..14)?.try_into().ok()?);

    for _ in 0..2 {
        if ethertype == ETHERTYPE_VLAN || ethertype == ETHERTYPE_VLAN_QINQ {
            ethertype = u16::from_be_bytes(frame.get(offset + 2..offset + 4)?.try_into().ok()?);
            offset += VLAN_TAG_LEN;
        } else {
            break;
        }
    }

    if ethertype != ETHERTYPE_IPV4 {
        return None;
    }

    let ip_header = frame.get(offset..)?;
    let version_ihl = *ip_header.first()?;
    if version_ihl >> 4 != 4 {
        return None;
    }
    let ihl = usize::from(version_ihl & 0x0F) * 4;
    if ihl < 20 || ip_header.len() < ihl {
        return None;
    }

    let protocol = *ip_header.get(9)?;
    let src_ip = Ipv4Addr::from(<[u8; 4]>::try_from(ip_header.get(12..16)?).ok()?);
    let dst_ip = Ipv4Addr::from(<[u8; 4]>::try_from(ip_header.get(16..20)?).ok()?);

    let l4 = ip_header.get(ihl..)?;
    let (transport, src_port, dst_port, l4_header_len) = match protocol {
        PROTO_TCP => {
            if l4.len() < 20 {
                return None;
            }
            (Transport::Tcp, read_u16(l4, 0)?, read_u16(l4, 2)?, usize::from(l4.get(12)? >> 4) * 4)
        }
        PROTO_UDP => {
            if l4.len() < 8 {
                return None;
            }
            (Transport::Udp, read_u16(l4, 0)?, read_u16(l4, 2)?, 8)
        }
        _ => return None,
    };

    if l4_header_len < 8 || l4.len() < l4_header_len {
        return None;
    }

    let descriptor =
        PacketDescriptor { src_ip, dst_ip, src_port, dst_port, transport };
    Some((descriptor, &l4[l4_header_len..]))
}

fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_be_bytes(buf.get(offset..offset + 2)?.try_into().ok()?))
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Fixed set of tunables the pipeline needs per packet. Cheap to clone
/// (everything behind `Arc` or `Copy`).
#[derive(Clone)]
pub struct PipelineConfig {
    pub whitelist_ports: Arc<HashSet<u16>>,
    pub thresholds: AnalyzerThresholds,
    pub ban_duration: Duration,
    pub monitor_only: bool,
}

/// Runs one frame through whitelist → analyze → ban, independent of any
/// particular worker-pool wiring. Exposed for direct unit testing; the
/// worker pool in [`PacketPipeline`] is just a scheduler around this.
pub fn process_frame(
    frame: &[u8],
    config: &PipelineConfig,
    ban_manager: &BanManager,
    detection_sink: Option<&dyn DetectionLogSink>,
    metrics: Option<&PipelineMetrics>,
) -> Verdict {
    if let Some(m) = metrics {
        m.packets_processed_total.add(1, &[]);
    }

    let Some((descriptor, payload)) = parse_ethernet_ipv4(frame) else {
        if let Some(m) = metrics {
            m.packets_parse_errors_total.add(1, &[]);
        }
        return Verdict::Allow;
    };

    if config.whitelist_ports.contains(&descriptor.src_port)
        || config.whitelist_ports.contains(&descriptor.dst_port)
    {
        if let Some(m) = metrics {
            m.packets_allowed_total.add(1, &[]);
        }
        return Verdict::Allow;
    }

    let is_udp = descriptor.transport == Transport::Udp;
    let verdict =
        analyze(payload, is_udp, config.thresholds, descriptor.dst_ip, descriptor.dst_port);

    match verdict {
        Verdict::Allow => {
            if let Some(m) = metrics {
                m.packets_allowed_total.add(1, &[]);
            }
        }
        Verdict::Block { reason } => {
            if let Some(m) = metrics {
                m.packets_blocked_total.add(1, &[]);
            }
            if let Some(sink) = detection_sink {
                sink.record(&DetectionRecord::new(
                    now_unix(),
                    descriptor.src_ip,
                    descriptor.dst_ip,
                    descriptor.src_port,
                    descriptor.dst_port,
                    descriptor.transport,
                    reason,
                    payload,
                ));
            }
            if !config.monitor_only {
                if let Err(e) = ban_manager.ban(descriptor.src_ip, config.ban_duration) {
                    warn!(src_ip = %descriptor.src_ip, error = %e, "failed to ban source IP");
                    if let Some(m) = metrics {
                        m.ban_errors_total.add(1, &[]);
                    }
                } else {
                    debug!(src_ip = %descriptor.src_ip, reason = reason.as_str(), "banned source IP");
                }
            }
        }
    }

    verdict
}

/// A fixed-size worker pool fed by a bounded channel. A full channel drops
/// the incoming frame and increments `packets_dropped_backpressure_total`
/// rather than blocking the capture thread — a capture-side stall would
/// otherwise cascade into dropped link-layer frames outside our control.
pub struct PacketPipeline {
    sender: mpsc::Sender<Vec<u8>>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl PacketPipeline {
    pub fn spawn(
        worker_count: usize,
        config: PipelineConfig,
        ban_manager: Arc<BanManager>,
        detection_sink: Option<Arc<dyn DetectionLogSink>>,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        let queue_capacity = worker_count.max(1) * 4;
        let (sender, receiver) = mpsc::channel::<Vec<u8>>(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                let config = config.clone();
                let ban_manager = Arc::clone(&ban_manager);
                let detection_sink = detection_sink.clone();
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    loop {
                        let frame = {
                            let mut rx = receiver.lock().await;
                            rx.recv().await
                        };
                        let Some(frame) = frame else { break };
                        process_frame(
                            &frame,
                            &config,
                            &ban_manager,
                            detection_sink.as_deref(),
                            metrics.as_deref(),
                        );
                    }
                })
            })
            .collect();

        Self { sender, workers }
    }

    /// Hands a captured frame off to a worker. Drops it (and reports the
    /// drop via `metrics`) if every worker is already backed up.
    pub fn submit(&self, frame: Vec<u8>, metrics: Option<&PipelineMetrics>) {
        if self.sender.try_send(frame).is_err() {
            if let Some(m) = metrics {
                m.packets_dropped_backpressure_total.add(1, &[]);
            }
        }
    }

    /// Stops accepting new frames and waits for in-flight workers to drain.
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Convenience timer for the ban manager's cleanup-sweep histogram.
pub struct SweepTimer(Instant);

impl SweepTimer {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn record(self, metrics: &PipelineMetrics) {
        metrics.cleanup_sweep_duration_seconds.record(self.0.elapsed().as_secs_f64(), &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::InMemoryBlocklistMap;

    fn eth_ipv4_udp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; ETH_HEADER_LEN];
        frame[12..14].copy_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45; // version 4, IHL 5
        ip[9] = PROTO_UDP;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);

        let mut udp = vec![0u8; 8];
        udp[0..2].copy_from_slice(&src_port.to_be_bytes());
        udp[2..4].copy_from_slice(&dst_port.to_be_bytes());

        frame.extend_from_slice(&ip);
        frame.extend_from_slice(&udp);
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn parses_ethernet_ipv4_udp_frame() {
        let frame = eth_ipv4_udp_frame(1234, 6881, b"payload");
        let (descriptor, payload) = parse_ethernet_ipv4(&frame).expect("should parse");
        assert_eq!(descriptor.src_port, 1234);
        assert_eq!(descriptor.dst_port, 6881);
        assert_eq!(descriptor.transport, Transport::Udp);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn non_ipv4_ethertype_is_none() {
        let mut frame = vec![0u8; ETH_HEADER_LEN + 20];
        frame[12..14].copy_from_slice(&0x86DDu16.to_be_bytes()); // IPv6
        assert!(parse_ethernet_ipv4(&frame).is_none());
    }

    /// Invariant 1: whitelisted ports always allow.
    #[test]
    fn whitelisted_destination_port_always_allows() {
        let frame = eth_ipv4_udp_frame(40000, 443, b"ut_pex ut_pex ut_pex");
        let config = PipelineConfig {
            whitelist_ports: Arc::new([443].into_iter().collect()),
            thresholds: AnalyzerThresholds::default(),
            ban_duration: Duration::from_secs(60),
            monitor_only: false,
        };
        let ban_manager = BanManager::new(Arc::new(InMemoryBlocklistMap::new()));
        let verdict = process_frame(&frame, &config, &ban_manager, None, None);
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(ban_manager.count(), 0);
    }

    #[test]
    fn monitor_only_blocks_without_banning() {
        let frame = eth_ipv4_udp_frame(40000, 6881, b"ut_pex marker payload here");
        let config = PipelineConfig {
            whitelist_ports: Arc::new(HashSet::new()),
            thresholds: AnalyzerThresholds::default(),
            ban_duration: Duration::from_secs(60),
            monitor_only: true,
        };
        let ban_manager = BanManager::new(Arc::new(InMemoryBlocklistMap::new()));
        let verdict = process_frame(&frame, &config, &ban_manager, None, None);
        assert!(matches!(verdict, Verdict::Block { .. }));
        assert_eq!(ban_manager.count(), 0);
    }

    #[test]
    fn blocked_verdict_bans_source_ip() {
        let frame = eth_ipv4_udp_frame(40000, 6881, b"ut_pex marker payload here");
        let config = PipelineConfig {
            whitelist_ports: Arc::new(HashSet::new()),
            thresholds: AnalyzerThresholds::default(),
            ban_duration: Duration::from_secs(60),
            monitor_only: false,
        };
        let ban_manager = BanManager::new(Arc::new(InMemoryBlocklistMap::new()));
        let verdict = process_frame(&frame, &config, &ban_manager, None, None);
        assert!(matches!(verdict, Verdict::Block { .. }));
        assert!(ban_manager.is_banned(Ipv4Addr::new(10, 0, 0, 1)));
    }
}
