use crate::analyzer::ReasonTag;
use crate::signatures::{
    BT_SIGNATURES, HANDSHAKE_PEER_ID_OFFSET, PEER_ID_PREFIXES, SIGNATURE_SCAN_LIMIT,
};

/// Substring-scans `payload` against the static signature and peer-ID
/// tables. Payloads are truncated to `SIGNATURE_SCAN_LIMIT` before scanning.
pub fn detect(payload: &[u8]) -> Option<ReasonTag> {
    let scan_window = &payload[..payload.len().min(SIGNATURE_SCAN_LIMIT)];

    if peer_id_at_handshake_offset(scan_window) || peer_id_anywhere(scan_window) {
        return Some(ReasonTag::PeerIDPrefix);
    }

    BT_SIGNATURES
        .iter()
        .any(|sig| contains(scan_window, sig))
        .then_some(ReasonTag::SignatureBT)
}

fn peer_id_at_handshake_offset(payload: &[u8]) -> bool {
    let Some(window) = payload.get(HANDSHAKE_PEER_ID_OFFSET..) else { return false };
    PEER_ID_PREFIXES.iter().any(|prefix| window.starts_with(prefix))
}

fn peer_id_anywhere(payload: &[u8]) -> bool {
    PEER_ID_PREFIXES.iter().any(|prefix| contains(payload, prefix))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(peer_id: &[u8]) -> Vec<u8> {
        let mut p = Vec::new();
        p.push(19);
        p.extend_from_slice(b"BitTorrent protocol");
        p.extend_from_slice(&[0u8; 8]); // reserved
        p.extend_from_slice(&[0u8; 20]); // info_hash
        p.extend_from_slice(peer_id);
        p
    }

    #[test]
    fn matches_raw_handshake_preamble() {
        let p = handshake(b"-UT3500-123456789012");
        assert_eq!(detect(&p), Some(ReasonTag::PeerIDPrefix));
    }

    #[test]
    fn matches_signature_without_peer_id() {
        assert_eq!(detect(b"ut_pex and other noise"), Some(ReasonTag::SignatureBT));
    }

    #[test]
    fn no_match_on_unrelated_payload() {
        assert_eq!(detect(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n"), None);
    }

    #[test]
    fn matches_peer_id_prefix_outside_handshake_offset() {
        let mut p = vec![0u8; 10];
        p.extend_from_slice(b"-qB4370-abcdefghijkl");
        assert_eq!(detect(&p), Some(ReasonTag::PeerIDPrefix));
    }
}
