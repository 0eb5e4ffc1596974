//! Orchestrates the detectors (§[`crate::detectors`]) against one payload
//! and produces a [`Verdict`]. Pure: no I/O, no locking, no mutable global
//! state. Safe to call concurrently from any number of threads.

use std::net::Ipv4Addr;

use crate::detectors::{dht, mse_pe, sig, udp_tracker, utp};
use crate::socks::unwrap_socks5;

/// Transport a packet arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// Closed set of reasons a flow was classified as BitTorrent. Informational
/// only — used for logging/metrics, never for enforcement decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonTag {
    SignatureBT,
    PeerIDPrefix,
    UdpTrackerConnect,
    UdpTrackerAnnounce,
    UdpTrackerScrape,
    Utp,
    DhtBencode,
    MsePeEntropy,
    SocksUnwrappedBT,
}

impl ReasonTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonTag::SignatureBT => "signature_bt",
            ReasonTag::PeerIDPrefix => "peer_id_prefix",
            ReasonTag::UdpTrackerConnect => "udp_tracker_connect",
            ReasonTag::UdpTrackerAnnounce => "udp_tracker_announce",
            ReasonTag::UdpTrackerScrape => "udp_tracker_scrape",
            ReasonTag::Utp => "utp",
            ReasonTag::DhtBencode => "dht_bencode",
            ReasonTag::MsePeEntropy => "mse_pe_entropy",
            ReasonTag::SocksUnwrappedBT => "socks_unwrapped_bt",
        }
    }
}

/// Classification outcome for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block { reason: ReasonTag },
}

/// Thresholds the analyzer's detectors are parameterized over. Lives
/// alongside the analyzer (not in [`crate::config`]) because it is the
/// contract detectors are tested against; `Config` constructs one of these
/// at startup.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerThresholds {
    pub min_payload_size: usize,
    pub entropy_threshold: f64,
}

impl Default for AnalyzerThresholds {
    fn default() -> Self {
        Self { min_payload_size: 60, entropy_threshold: 7.6 }
    }
}

/// Runs the detector stack against one payload. `dst_ip`/`dst_port` are part
/// of the contract for parity with the packet pipeline's call site and
/// future port-aware heuristics; no detector currently consults them.
pub fn analyze(
    payload: &[u8],
    is_udp: bool,
    thresholds: AnalyzerThresholds,
    _dst_ip: Ipv4Addr,
    _dst_port: u16,
) -> Verdict {
    analyze_inner(payload, is_udp, thresholds, 0)
}

fn analyze_inner(payload: &[u8], is_udp: bool, thresholds: AnalyzerThresholds, depth: u8) -> Verdict {
    if payload.len() < thresholds.min_payload_size && !is_udp {
        return Verdict::Allow;
    }

    if let Verdict::Block { reason } = run_detectors(payload, is_udp, thresholds) {
        return Verdict::Block { reason };
    }

    if depth == 0 {
        if let Some(inner) = unwrap_socks5(payload) {
            return match run_detectors(inner, is_udp, thresholds) {
                Verdict::Block { .. } => Verdict::Block { reason: ReasonTag::SocksUnwrappedBT },
                Verdict::Allow => Verdict::Allow,
            };
        }
    }

    Verdict::Allow
}

/// Steps 2-6: the detector stack itself, without the `min_payload_size` gate
/// (step 1) or the SOCKS5 retry (step 7). Shared by the top-level call and
/// the SOCKS5-unwrapped retry so the inner payload is never re-gated on
/// length.
fn run_detectors(payload: &[u8], is_udp: bool, thresholds: AnalyzerThresholds) -> Verdict {
    if let Some(reason) = udp_tracker::detect(payload, is_udp) {
        return Verdict::Block { reason };
    }
    if let Some(reason) = utp::detect(payload, is_udp) {
        return Verdict::Block { reason };
    }
    if let Some(reason) = dht::detect(payload, is_udp) {
        return Verdict::Block { reason };
    }
    if let Some(reason) = sig::detect(payload) {
        return Verdict::Block { reason };
    }
    if let Some(reason) =
        mse_pe::detect(payload, is_udp, thresholds.min_payload_size, thresholds.entropy_threshold)
    {
        return Verdict::Block { reason };
    }

    Verdict::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> AnalyzerThresholds {
        AnalyzerThresholds::default()
    }

    fn dst() -> (Ipv4Addr, u16) {
        (Ipv4Addr::new(10, 0, 0, 1), 6881)
    }

    /// S1 — classic BT handshake.
    #[test]
    fn classic_handshake_is_blocked() {
        let mut payload = vec![19];
        payload.extend_from_slice(b"BitTorrent protocol");
        payload.extend_from_slice(&[0u8; 8]);
        payload.extend_from_slice(&[0u8; 20]);
        payload.extend_from_slice(b"-UT3500-123456789012");

        let (ip, port) = dst();
        let verdict = analyze(&payload, false, thresholds(), ip, port);
        assert!(matches!(
            verdict,
            Verdict::Block { reason: ReasonTag::SignatureBT | ReasonTag::PeerIDPrefix }
        ));
    }

    /// S5 — STUN must not be misclassified as uTP.
    #[test]
    fn stun_binding_request_is_allowed() {
        let mut payload = vec![0u8; 20];
        payload[0] = 0x00;
        payload[1] = 0x01;
        payload[4..8].copy_from_slice(&0x2112_A442u32.to_be_bytes());

        let (ip, port) = dst();
        assert_eq!(analyze(&payload, true, thresholds(), ip, port), Verdict::Allow);
    }

    /// S7 — SOCKS5-wrapped BT handshake.
    #[test]
    fn socks5_wrapped_handshake_is_blocked_with_wrapper_tag() {
        let mut inner = vec![19];
        inner.extend_from_slice(b"BitTorrent protocol");
        inner.extend_from_slice(&[0u8; 8]);
        inner.extend_from_slice(&[0u8; 20]);
        inner.extend_from_slice(b"-UT3500-123456789012");

        let mut payload = vec![0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x1a, 0xe1];
        payload.extend_from_slice(&inner);

        let (ip, port) = dst();
        let verdict = analyze(&payload, false, thresholds(), ip, port);
        assert_eq!(verdict, Verdict::Block { reason: ReasonTag::SocksUnwrappedBT });
    }

    /// S7 variant — the unwrapped inner payload is shorter than
    /// `min_payload_size` but must still be run through the detector stack
    /// rather than re-gated on length.
    #[test]
    fn socks5_wrapped_short_handshake_is_blocked() {
        let mut inner = vec![19];
        inner.extend_from_slice(b"BitTorrent protocol");
        inner.extend_from_slice(&[0u8; 8]);
        inner.extend_from_slice(&[0u8; 4]);

        assert!(inner.len() < thresholds().min_payload_size);

        let mut payload = vec![0x05, 0x01, 0x00, 0x01, 1, 2, 3, 4, 0x1a, 0xe1];
        payload.extend_from_slice(&inner);

        let (ip, port) = dst();
        let verdict = analyze(&payload, false, thresholds(), ip, port);
        assert_eq!(verdict, Verdict::Block { reason: ReasonTag::SocksUnwrappedBT });
    }

    /// Invariant 2: analyze never panics and always returns a verdict.
    #[test]
    fn never_panics_on_arbitrary_short_input() {
        for len in 0..40 {
            let payload = vec![0xAAu8; len];
            let (ip, port) = dst();
            let _ = analyze(&payload, true, thresholds(), ip, port);
            let _ = analyze(&payload, false, thresholds(), ip, port);
        }
    }

    /// Round-trip: repeated calls are deterministic.
    #[test]
    fn analyze_is_idempotent_on_same_input() {
        let payload = b"ut_pex".to_vec();
        let (ip, port) = dst();
        let v1 = analyze(&payload, false, thresholds(), ip, port);
        let v2 = analyze(&payload, false, thresholds(), ip, port);
        assert_eq!(v1, v2);
    }
}
