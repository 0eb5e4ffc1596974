//! Pure BitTorrent sub-protocol detectors. Each module implements one
//! detector from a single `(payload, is_udp)` pair; the [`crate::analyzer`]
//! runs them in a fixed order and stops at the first match.

pub mod dht;
pub mod mse_pe;
pub mod sig;
pub mod udp_tracker;
pub mod utp;
