use crate::analyzer::ReasonTag;

const QUERY_TYPE_KEYS: &[&[u8]] =
    &[b"find_node", b"get_peers", b"announce_peer", b"ping", b"put", b"get"];

/// Mainline DHT (BEP 5) bencode envelope. A bare signature hit on `d1:ad2:id20:`
/// isn't enough on its own — unrelated bencode can share the prefix — so this
/// also requires at least one recognized query-type key in the payload.
pub fn detect(payload: &[u8], is_udp: bool) -> Option<ReasonTag> {
    if !is_udp || payload.first() != Some(&b'd') {
        return None;
    }

    let has_envelope = contains(payload, b"d1:ad2:id20:") || contains(payload, b"d1:rd2:id20:");
    if !has_envelope {
        return None;
    }

    let has_query_key = QUERY_TYPE_KEYS.iter().any(|key| contains(payload, key));
    has_query_key.then_some(ReasonTag::DhtBencode)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
