//! The kernel blocklist map contract (C6): a bounded, time-expiring
//! IPv4 → expiry map queried by a kernel packet hook and mutated from user
//! space. [`crate::ban_manager::BanManager`] is generic over any
//! implementation of [`BlocklistMap`] — the real backend is
//! `flowguard-ebpf`'s `BlocklistMapHandle`; tests and non-Linux builds use
//! [`InMemoryBlocklistMap`].

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::RwLock;

use crate::error::{ClassifierError, Result};

/// Operations the ban manager needs from a kernel-visible (or emulated)
/// blocklist map.
pub trait BlocklistMap: Send + Sync {
    /// Insert or overwrite the ban for `ip`, expiring at `expires_at` (unix
    /// seconds).
    fn put(&self, ip: Ipv4Addr, expires_at: u64) -> Result<()>;

    /// Remove `ip`. Not-present is a no-op, not an error.
    fn delete(&self, ip: Ipv4Addr) -> Result<()>;

    /// Current recorded expiry for `ip`, if any. Does not itself check
    /// expiry — callers compare against their own clock.
    fn lookup(&self, ip: Ipv4Addr) -> Option<u64>;
}

/// A `RwLock`-guarded in-process stand-in for the kernel map, used in tests
/// and on platforms without the eBPF backend. Satisfies the same contract
/// the kernel hook relies on.
#[derive(Default)]
pub struct InMemoryBlocklistMap {
    entries: RwLock<HashMap<Ipv4Addr, u64>>,
}

impl InMemoryBlocklistMap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlocklistMap for InMemoryBlocklistMap {
    fn put(&self, ip: Ipv4Addr, expires_at: u64) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| ClassifierError::Ban {
            detail: "in-memory blocklist lock poisoned".to_string(),
        })?;
        entries.insert(ip, expires_at);
        Ok(())
    }

    fn delete(&self, ip: Ipv4Addr) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| ClassifierError::Ban {
            detail: "in-memory blocklist lock poisoned".to_string(),
        })?;
        entries.remove(&ip);
        Ok(())
    }

    fn lookup(&self, ip: Ipv4Addr) -> Option<u64> {
        self.entries.read().ok()?.get(&ip).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_lookup_round_trips() {
        let map = InMemoryBlocklistMap::new();
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        map.put(ip, 1_000).unwrap();
        assert_eq!(map.lookup(ip), Some(1_000));
    }

    #[test]
    fn delete_is_a_no_op_when_absent() {
        let map = InMemoryBlocklistMap::new();
        assert!(map.delete(Ipv4Addr::new(10, 0, 0, 9)).is_ok());
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let map = InMemoryBlocklistMap::new();
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        map.put(ip, 1_000).unwrap();
        map.put(ip, 2_000).unwrap();
        assert_eq!(map.lookup(ip), Some(2_000));
    }
}
