use crate::analyzer::ReasonTag;
use crate::signatures::{
    UDP_TRACKER_ACTION_ANNOUNCE, UDP_TRACKER_ACTION_CONNECT, UDP_TRACKER_ACTION_SCRAPE,
    UDP_TRACKER_MAGIC, UDP_TRACKER_MIN_ANNOUNCE_LEN, UDP_TRACKER_MIN_CONNECT_LEN,
    UDP_TRACKER_MIN_SCRAPE_LEN,
};

/// BEP 15 UDP tracker protocol: `protocol_id(8) | action(4) | transaction_id(4) | ...`.
pub fn detect(payload: &[u8], is_udp: bool) -> Option<ReasonTag> {
    if !is_udp || payload.len() < UDP_TRACKER_MIN_CONNECT_LEN {
        return None;
    }

    let magic = u64::from_be_bytes(payload[0..8].try_into().ok()?);
    if magic != UDP_TRACKER_MAGIC {
        return None;
    }

    let action = u32::from_be_bytes(payload[8..12].try_into().ok()?);
    match action {
        UDP_TRACKER_ACTION_CONNECT if payload.len() >= UDP_TRACKER_MIN_CONNECT_LEN => {
            Some(ReasonTag::UdpTrackerConnect)
        }
        UDP_TRACKER_ACTION_ANNOUNCE if payload.len() >= UDP_TRACKER_MIN_ANNOUNCE_LEN => {
            Some(ReasonTag::UdpTrackerAnnounce)
        }
        UDP_TRACKER_ACTION_SCRAPE if payload.len() >= UDP_TRACKER_MIN_SCRAPE_LEN => {
            Some(ReasonTag::UdpTrackerScrape)
        }
        _ => None,
    }
}
