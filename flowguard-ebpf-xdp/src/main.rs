//! XDP program enforcing the kernel blocklist map.
//!
//! For every IPv4 packet, look up the source address in `BLOCKLIST`; if an
//! entry exists and has not yet expired, drop the packet before it reaches
//! the user-space pipeline. Classification itself happens entirely in user
//! space (`flowguard-core`) — this program only enforces bans already
//! decided there.
#![no_std]
#![no_main]

use aya_ebpf::{
    macros::{map, xdp},
    maps::{Array, HashMap},
    programs::XdpContext,
};
use flowguard_ebpf_common::DEFAULT_CAPACITY;

use core::mem;

// ── Network protocol constants (network byte order on LE host) ──────────────

const ETH_P_IP: u16 = 0x0800_u16.swap_bytes();
const ETH_P_8021Q: u16 = 0x8100_u16.swap_bytes();
const ETH_P_8021AD: u16 = 0x88A8_u16.swap_bytes();

// ── Network header definitions ───────────────────────────────────────────────
//
// aya-ebpf-bindings does not include ethernet/IP headers (those are UAPI
// network headers, not BPF-specific). We define minimal versions here.

#[repr(C)]
struct EthHdr {
    h_dest: [u8; 6],
    h_source: [u8; 6],
    h_proto: u16, // network byte order
}

#[repr(C)]
struct VlanHdr {
    tci: u16,
    encapsulated_proto: u16, // network byte order
}

/// Minimal IPv4 header (no options).
/// The first byte encodes `ihl` (low nibble) and `version` (high nibble)
/// following `__LITTLE_ENDIAN_BITFIELD` ordering.
#[repr(C)]
struct IpHdr {
    version_ihl: u8,
    tos: u8,
    tot_len: u16,
    id: u16,
    frag_off: u16, // network byte order; contains DF/MF/offset flags
    ttl: u8,
    protocol: u8,
    check: u16,
    saddr: u32, // network byte order
    daddr: u32, // network byte order
}

impl IpHdr {
    #[inline(always)]
    fn ihl(&self) -> u8 {
        self.version_ihl & 0x0F
    }
}

// ── BPF maps ─────────────────────────────────────────────────────────────────

/// Keyed by `encode_ip_key(src_ip)`, valued with the absolute expiry (unix
/// seconds). Userspace owns all writes; this program only reads.
#[map]
#[allow(non_upper_case_globals)]
static BLOCKLIST: HashMap<u32, u64> = HashMap::with_max_entries(DEFAULT_CAPACITY, 0);

/// Single-element clock the userspace ban manager refreshes on every
/// `put`/cleanup tick, since BPF has no direct wall-clock syscall access.
/// The value is unix seconds.
#[map]
#[allow(non_upper_case_globals)]
static CURRENT_TIME: Array<u64> = Array::with_max_entries(1, 0);

// ── Packet access helper ─────────────────────────────────────────────────────

/// Returns a const pointer to `T` at `offset` bytes from the start of the
/// packet, or `None` if the access would exceed `data_end`.
///
/// The BPF verifier accepts this pattern (explicit bounds check before cast).
#[inline(always)]
unsafe fn ptr_at<T>(ctx: &XdpContext, offset: usize) -> Option<*const T> {
    let start = ctx.data();
    let end = ctx.data_end();
    let access_end = start.checked_add(offset)?.checked_add(mem::size_of::<T>())?;
    if access_end > end {
        return None;
    }
    Some(start.checked_add(offset)? as *const T)
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[xdp]
pub fn bt_blocklist_drop(ctx: XdpContext) -> u32 {
    match try_flowguard_drop(&ctx) {
        Ok(true) => aya_ebpf::bindings::xdp_action::XDP_DROP,
        Ok(false) => aya_ebpf::bindings::xdp_action::XDP_PASS,
        Err(()) => aya_ebpf::bindings::xdp_action::XDP_PASS,
    }
}

/// Returns `Ok(true)` if the packet's source IP is currently banned.
fn try_flowguard_drop(ctx: &XdpContext) -> Result<bool, ()> {
    let mut offset = 0usize;

    let eth = unsafe { ptr_at::<EthHdr>(ctx, offset).ok_or(())? };
    offset = offset.saturating_add(mem::size_of::<EthHdr>());

    let mut eth_type = unsafe { (*eth).h_proto };

    // Up to two VLAN tags (QinQ / 802.1ad)
    if eth_type == ETH_P_8021Q || eth_type == ETH_P_8021AD {
        let vlan = unsafe { ptr_at::<VlanHdr>(ctx, offset).ok_or(())? };
        offset = offset.saturating_add(mem::size_of::<VlanHdr>());
        eth_type = unsafe { (*vlan).encapsulated_proto };
    }
    if eth_type == ETH_P_8021Q || eth_type == ETH_P_8021AD {
        let vlan = unsafe { ptr_at::<VlanHdr>(ctx, offset).ok_or(())? };
        offset = offset.saturating_add(mem::size_of::<VlanHdr>());
        eth_type = unsafe { (*vlan).encapsulated_proto };
    }

    // Non-IPv4 (including IPv6) is out of scope: pass without inspection.
    if eth_type != ETH_P_IP {
        return Ok(false);
    }

    let ip = unsafe { ptr_at::<IpHdr>(ctx, offset).ok_or(())? };

    let ip_hdr_len = unsafe { usize::from((*ip).ihl()).saturating_mul(4) };
    if ip_hdr_len < mem::size_of::<IpHdr>() {
        return Ok(false);
    }

    // Source-IP block list applies regardless of fragmentation; only the
    // fixed 20-byte IPv4 header is read, so fragments are handled the same
    // as any other packet.
    let saddr = unsafe { (*ip).saddr };

    let now = CURRENT_TIME.get(0).copied().unwrap_or(0);
    match unsafe { BLOCKLIST.get(&saddr) } {
        Some(expires_at) if *expires_at > now => Ok(true),
        _ => Ok(false),
    }
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
