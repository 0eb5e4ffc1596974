use std::net::Ipv4Addr;

#[cfg(target_os = "linux")]
use libc;

use aya::maps::{Array, HashMap, MapData};
use aya::programs::{Xdp, XdpFlags};
use aya::{Ebpf, EbpfLoader};
use flowguard_ebpf_common::{decode_ip_key, encode_ip_key, DEFAULT_CAPACITY};
use tracing::{debug, info};

use crate::EbpfError;

/// Raw bytes of the compiled XDP BPF object, embedded at compile time.
/// `include_bytes_aligned!` ensures 8-byte alignment required by aya's ELF parser.
static XDP_BPF_BYTES: &[u8] = aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/xdp.bpf.o"));

/// Owns the loaded XDP program and the `BLOCKLIST`/`CURRENT_TIME` maps it
/// enforces against. The ban manager drives all writes through this handle;
/// the kernel program only ever reads.
pub struct BlocklistMapHandle {
    ebpf: Ebpf,
    interface: String,
}

impl BlocklistMapHandle {
    /// Load the XDP BPF program and attach it to the given network interface.
    pub fn load(interface: &str) -> Result<Self, EbpfError> {
        // Remove the locked memory limit so BPF maps can be created without depending on
        // `ulimits: memlock: -1` in the deployment environment.
        #[cfg(target_os = "linux")]
        unsafe {
            let rlim =
                libc::rlimit { rlim_cur: libc::RLIM_INFINITY, rlim_max: libc::RLIM_INFINITY };
            let _ = libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim);
        }

        let mut ebpf = EbpfLoader::new().load(XDP_BPF_BYTES).map_err(EbpfError::Load)?;

        let program: &mut Xdp = ebpf
            .program_mut("bt_blocklist_drop")
            .ok_or(EbpfError::ProgramNotFound)?
            .try_into()
            .map_err(EbpfError::ProgramType)?;

        program.load().map_err(EbpfError::ProgramLoad)?;
        program
            .attach(interface, XdpFlags::default())
            .map_err(EbpfError::Attach)?;

        info!(interface, "flowguard XDP blocklist program attached");

        Ok(Self { ebpf, interface: interface.to_string() })
    }

    /// Ban `ip` until `expires_at` (unix seconds). Overwrites any existing entry.
    pub fn put(&mut self, ip: Ipv4Addr, expires_at: u64) -> Result<(), EbpfError> {
        let mut map = self.blocklist_map_mut()?;
        map.insert(encode_ip_key(ip), expires_at, 0)
            .map_err(|source| EbpfError::MapAccess { map: "BLOCKLIST", source })?;
        debug!(%ip, expires_at, "blocklist entry written");
        Ok(())
    }

    /// Remove `ip` from the blocklist, if present.
    pub fn delete(&mut self, ip: Ipv4Addr) -> Result<(), EbpfError> {
        let mut map = self.blocklist_map_mut()?;
        match map.remove(&encode_ip_key(ip)) {
            Ok(()) | Err(aya::maps::MapError::KeyNotFound) => Ok(()),
            Err(source) => Err(EbpfError::MapAccess { map: "BLOCKLIST", source }),
        }
    }

    /// Return the ban expiry for `ip`, if one is currently recorded. Does not
    /// check expiry — callers compare against their own clock.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<u64> {
        let map = self.blocklist_map()?;
        map.get(&encode_ip_key(ip), 0).ok()
    }

    /// List every currently-recorded (IP, expiry) pair. Used by the ban
    /// manager's periodic cleanup sweep.
    pub fn iter_entries(&self) -> Vec<(Ipv4Addr, u64)> {
        let Some(map) = self.blocklist_map() else { return Vec::new() };
        map.iter()
            .filter_map(Result::ok)
            .map(|(key, expires_at)| (decode_ip_key(key), expires_at))
            .collect()
    }

    /// Publish the current wall-clock time (unix seconds) into the
    /// single-element `CURRENT_TIME` map the kernel program reads to decide
    /// whether a `BLOCKLIST` entry has expired.
    pub fn set_clock(&mut self, now: u64) -> Result<(), EbpfError> {
        let map_data = self.ebpf.map_mut("CURRENT_TIME").ok_or(EbpfError::MapNotFound("CURRENT_TIME"))?;
        let mut map = Array::<_, u64>::try_from(map_data)
            .map_err(|source| EbpfError::MapAccess { map: "CURRENT_TIME", source })?;
        map.set(0, now, 0).map_err(|source| EbpfError::MapAccess { map: "CURRENT_TIME", source })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn blocklist_map(&self) -> Option<HashMap<&MapData, u32, u64>> {
        let map_data = self.ebpf.map("BLOCKLIST")?;
        HashMap::try_from(map_data).ok()
    }

    fn blocklist_map_mut(&mut self) -> Result<HashMap<&mut MapData, u32, u64>, EbpfError> {
        let map_data = self.ebpf.map_mut("BLOCKLIST").ok_or(EbpfError::MapNotFound("BLOCKLIST"))?;
        HashMap::try_from(map_data).map_err(|source| EbpfError::MapAccess { map: "BLOCKLIST", source })
    }
}

/// Exposed so tests and `flowguard-core` callers can size pre-allocations
/// consistently with the kernel map's `max_entries`.
pub fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}
