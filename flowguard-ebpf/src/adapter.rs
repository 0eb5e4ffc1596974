//! Bridges [`BlocklistMapHandle`]'s `&mut self` map operations (aya's maps
//! are not internally synchronized) to the `&self`, `Send + Sync` contract
//! `flowguard-core`'s ban manager expects from a [`BlocklistMap`].

use std::net::Ipv4Addr;
use std::sync::Mutex;

use flowguard_core::blocklist::BlocklistMap;
use flowguard_core::error::{ClassifierError, Result};

use crate::blocklist::BlocklistMapHandle;

pub struct KernelBlocklistMap(Mutex<BlocklistMapHandle>);

impl KernelBlocklistMap {
    pub fn new(handle: BlocklistMapHandle) -> Self {
        Self(Mutex::new(handle))
    }

    /// Publishes the wall-clock time the kernel program reads to evaluate
    /// entry expiry. Not part of the `BlocklistMap` contract: only the
    /// entry point's clock-tick driver calls this.
    pub fn set_clock(&self, now: u64) -> Result<()> {
        let mut handle = self.lock()?;
        handle.set_clock(now).map_err(|e| ClassifierError::Init(e.to_string()))
    }

    pub fn interface(&self) -> Result<String> {
        Ok(self.lock()?.interface().to_string())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BlocklistMapHandle>> {
        self.0.lock().map_err(|_| ClassifierError::Init("blocklist handle lock poisoned".to_string()))
    }
}

impl BlocklistMap for KernelBlocklistMap {
    fn put(&self, ip: Ipv4Addr, expires_at: u64) -> Result<()> {
        let mut handle = self.lock()?;
        handle.put(ip, expires_at).map_err(|e| ClassifierError::Ban { detail: e.to_string() })
    }

    fn delete(&self, ip: Ipv4Addr) -> Result<()> {
        let mut handle = self.lock()?;
        handle.delete(ip).map_err(|e| ClassifierError::Ban { detail: e.to_string() })
    }

    fn lookup(&self, ip: Ipv4Addr) -> Option<u64> {
        self.0.lock().ok()?.lookup(ip)
    }
}
