//! Types and key-encoding shared between the BPF kernel program and the
//! userspace loader.
//!
//! This crate is `no_std` so it can be compiled for both targets:
//! - `bpfel-unknown-none` (kernel-side XDP program)
//! - the host target (userspace loader in `flowguard-ebpf`)
//!
//! Enable the `aya-pod` feature in the userspace crate to get the
//! `aya::Pod` impl required for reading values out of BPF maps.
#![no_std]

use core::net::Ipv4Addr;

/// Default bound on the number of concurrently banned source IPs.
///
/// Matches the blocklist map's `max_entries`; exceeding it makes `put`
/// fail until `cleanup_expired` frees room.
pub const DEFAULT_CAPACITY: u32 = 100_000;

/// Encode an IPv4 address as the blocklist map key.
///
/// The XDP program reads `ip->saddr` directly out of packet memory as a
/// raw `u32` — on a little-endian host that is the network-order bytes
/// reinterpreted native-endian, i.e. `u32::from_ne_bytes`, not
/// `from_be_bytes`. The userspace side must encode keys the same way so
/// that `put`/`delete`/`lookup` address the same map slot the kernel
/// program reads.
#[inline(always)]
pub fn encode_ip_key(ip: Ipv4Addr) -> u32 {
    u32::from_ne_bytes(ip.octets())
}

/// Inverse of [`encode_ip_key`], used when enumerating the kernel map
/// (diagnostics, tests) back into an [`Ipv4Addr`].
#[inline(always)]
pub fn decode_ip_key(key: u32) -> Ipv4Addr {
    Ipv4Addr::from(key.to_ne_bytes())
}
