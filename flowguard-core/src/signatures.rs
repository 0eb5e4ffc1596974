//! Immutable signature data: raw byte patterns, peer-ID prefixes, and the
//! port whitelist. No operations beyond lookup live here — see
//! [`crate::detectors`] for the code that consults these tables.

/// BitTorrent byte-pattern signatures, matched as plain substrings against
/// (optionally truncated) payload bytes. Grouped by origin only in comments;
/// the detector that uses each group treats the whole table as one set.
pub const BT_SIGNATURES: &[&[u8]] = &[
    // Raw handshake preamble
    b"\x13BitTorrent protocol",
    b"BitTorrent protocol",
    // libtorrent markers
    b"1:v4:LT",
    b"-LT20",
    b"-LT12",
    // PEX (ut_pex) bencode keys
    b"ut_pex",
    b"5:added",
    b"7:added.f",
    b"7:dropped",
    b"6:added6",
    b"8:added6.f",
    b"8:dropped6",
    b"1:m",
    // BEP 10 extension protocol
    b"ut_metadata",
    b"12:ut_holepunch",
    b"11:upload_only",
    b"10:share_mode",
    b"9:lt_donthave",
    b"11:LT_metadata",
    b"6:yourip",
    b"13:metadata_size",
    b"8:msg_type",
    b"10:total_size",
    b"4:reqq",
    // Tracker / magnet fragments
    b"magnet:?",
    b"magnet:?xt=urn:btih:",
    b"magnet:?xt=urn:btmh:",
    b"udp://tracker.",
    b"announce.php?passkey=",
    b"info_hash",
    b"peer_id=",
    b"uploaded=",
    b"downloaded=",
    b"supportcrypto=",
    b"requirecrypto=",
    b"cryptoport=",
    // DHT bencode skeleton
    b"d1:ad2:id20:",
    b"d1:rd2:id20:",
    b"1:y1:q",
    b"1:y1:r",
    b"find_node",
    b"4:ping",
    b"9:get_peers",
    b"13:announce_peer",
    b"3:put",
    b"3:get",
    b"5:token",
    b"6:nodes6",
    b"6:target",
    // Local Service Discovery
    b"BT-SEARCH * HTTP/1.1",
    b"Host: 239.192.152.143:6771",
    b"Infohash: ",
    // MSE/PE obfuscation handshake keys
    b"keyA",
    b"keyB",
    b"req1",
    b"req2",
    // BT v2
    b"12:piece layers",
    b"9:file tree",
    b"12:pieces root",
    // WebSeed / HTTP tracker fragments, client User-Agent fingerprints
    b"GET /webseed?info_hash=",
    b"GET /data?fid=",
    b"&size=",
    b"User-Agent: Azureus",
    b"User-Agent: BitTorrent",
    b"User-Agent: BTWebClient",
    b"User-Agent: Shareaza",
    b"User-Agent: FlashGet",
];

/// Azureus-style and legacy BitTorrent client peer-ID prefixes.
pub const PEER_ID_PREFIXES: &[&[u8]] = &[
    b"-qB", b"-TR", b"-UT", b"-LT", b"-DE", b"-BM", b"-AZ", b"-lt", b"-KT", b"-FW", b"-XL",
    b"-SD", b"-UM", b"-KG", b"M4-", b"T0", b"OP", b"XBT", b"exbc", b"FUTB", b"Plus", b"turbo",
    b"btpd",
];

/// Offset into a BT handshake payload at which a peer ID is expected to
/// start: `1 (pstrlen) + 19 (pstr) + 8 (reserved) + 20 (info_hash)`.
pub const HANDSHAKE_PEER_ID_OFFSET: usize = 48;

/// UDP tracker protocol magic, read as a big-endian `u64` from the first 8
/// bytes of a tracker packet.
pub const UDP_TRACKER_MAGIC: u64 = 0x0000_0417_2710_1980;

pub const UDP_TRACKER_ACTION_CONNECT: u32 = 0;
pub const UDP_TRACKER_ACTION_ANNOUNCE: u32 = 1;
pub const UDP_TRACKER_ACTION_SCRAPE: u32 = 2;

pub const UDP_TRACKER_MIN_CONNECT_LEN: usize = 16;
pub const UDP_TRACKER_MIN_ANNOUNCE_LEN: usize = 98;
pub const UDP_TRACKER_MIN_SCRAPE_LEN: usize = 36;

/// Ports never subjected to classification; traffic on any of these is
/// assumed to be legitimate, high-value infrastructure (DNS, HTTPS, XMPP, …).
pub const DEFAULT_WHITELIST_PORTS: &[u16] = &[22, 53, 80, 443, 853, 5222, 5269];

/// Payloads longer than this are truncated before signature scanning, to
/// bound D-sig's cost on oversized packets.
pub const SIGNATURE_SCAN_LIMIT: usize = 8 * 1024;
