use crate::analyzer::ReasonTag;
use crate::entropy::shannon_entropy;

/// TLS record header prefixes (`ContentType=0x16|0x17, Major=0x03, Minor=0x01..=0x04`)
/// that legitimately produce high-entropy payloads and must not be flagged.
const TLS_RECORD_PREFIXES: &[[u8; 3]] = &[
    [0x16, 0x03, 0x01],
    [0x16, 0x03, 0x02],
    [0x16, 0x03, 0x03],
    [0x16, 0x03, 0x04],
    [0x17, 0x03, 0x01],
    [0x17, 0x03, 0x02],
    [0x17, 0x03, 0x03],
    [0x17, 0x03, 0x04],
];

/// MSE/PE (obfuscation) detection: a TCP payload above `min_payload_size`
/// whose entropy clears `entropy_threshold` and does not look like a TLS
/// record is treated as an obfuscated BitTorrent stream.
pub fn detect(
    payload: &[u8],
    is_udp: bool,
    min_payload_size: usize,
    entropy_threshold: f64,
) -> Option<ReasonTag> {
    if is_udp || payload.len() < min_payload_size {
        return None;
    }

    if looks_like_tls_record(payload) {
        return None;
    }

    (shannon_entropy(payload) >= entropy_threshold).then_some(ReasonTag::MsePeEntropy)
}

fn looks_like_tls_record(payload: &[u8]) -> bool {
    payload.len() >= 3
        && TLS_RECORD_PREFIXES.iter().any(|prefix| payload.starts_with(prefix))
}
