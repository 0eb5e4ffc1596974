use crate::analyzer::ReasonTag;

const MIN_LEN: usize = 20;
const VERSION: u8 = 1;
const MAX_VALID_TYPE: u8 = 4; // ST_DATA=0 .. ST_SYN=4
const MAX_EXTENSION_TYPE: u8 = 4; // BEP 29: 0=SACK, 1=ext bits, 2=close reason, 3-4 reserved

/// BEP 29 uTP header: first byte is `type:4 | version:4`; second byte is the
/// first extension-chain type (0 = no extensions). Every `next_type` in the
/// chain must stay within the known extension range — this floor is what
/// keeps the detector from matching STUN packets, which share the version
/// nibble by coincidence.
pub fn detect(payload: &[u8], is_udp: bool) -> Option<ReasonTag> {
    if !is_udp || payload.len() < MIN_LEN {
        return None;
    }

    let first = payload[0];
    let version = first & 0x0F;
    let packet_type = first >> 4;
    if version != VERSION || packet_type > MAX_VALID_TYPE {
        return None;
    }

    let mut next_type = payload[1];
    let mut offset = 2usize;
    while next_type != 0 {
        if next_type > MAX_EXTENSION_TYPE {
            return None;
        }
        let Some(&length) = payload.get(offset.wrapping_add(1)) else { return None };
        let ext_len = usize::from(length);
        let Some(data_start) = offset.checked_add(2) else { return None };
        let Some(data_end) = data_start.checked_add(ext_len) else { return None };
        if data_end > payload.len() {
            return None;
        }
        next_type = payload[offset];
        offset = data_end;
    }

    Some(ReasonTag::Utp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syn_packet(extension_byte: u8) -> Vec<u8> {
        let mut p = vec![0u8; 20];
        p[0] = 0x41; // type=4 (ST_SYN), version=1
        p[1] = extension_byte;
        p
    }

    #[test]
    fn accepts_syn_with_no_extensions() {
        assert_eq!(detect(&syn_packet(0), true), Some(ReasonTag::Utp));
    }

    #[test]
    fn declines_too_short_packet() {
        let p = vec![0x41u8, 0x00];
        assert_eq!(detect(&p, true), None);
    }

    #[test]
    fn declines_stun_binding_request() {
        // STUN: first byte 0x00 or 0x01 (message type), magic cookie 0x2112A442 at offset 4.
        let mut p = vec![0u8; 20];
        p[0] = 0x01;
        p[1] = 0x01;
        p[4..8].copy_from_slice(&0x2112_A442u32.to_be_bytes());
        assert_eq!(detect(&p, true), None);
    }

    #[test]
    fn declines_extension_type_above_floor() {
        let mut p = syn_packet(5); // next_type = 5, above MAX_EXTENSION_TYPE
        p.extend_from_slice(&[0, 0]); // length=0 fallback, shouldn't matter
        assert_eq!(detect(&p, true), None);
    }

    #[test]
    fn walks_a_valid_extension_chain() {
        let mut p = vec![0u8; 20];
        p[0] = 0x21; // type=2 (ST_STATE), version=1
        p[1] = 1; // first extension type = 1 (ext bits)
        // extension header lives right after the fixed 20-byte uTP header in
        // this simplified test payload, matching the walk logic's `offset`.
        p.truncate(2);
        p.push(0); // next_type = 0 (terminates chain)
        p.push(4); // length = 4
        p.extend_from_slice(&[0u8; 4]);
        p.resize(20, 0);
        assert_eq!(detect(&p, true), Some(ReasonTag::Utp));
    }
}
