//! User-space ban cache (C7): owns the blocklist map handle and a shadow
//! copy used as the authoritative source for the periodic expiry sweep,
//! since enumerating the kernel map cheaply isn't guaranteed.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::blocklist::BlocklistMap;
use crate::error::{ClassifierError, Result};

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Owns all mutation of the blocklist map. The analyzer never touches this
/// directly; only the packet pipeline calls `ban`.
pub struct BanManager {
    blocklist: Arc<dyn BlocklistMap>,
    shadow: RwLock<HashMap<Ipv4Addr, u64>>,
    cleanup_stop: RwLock<Option<watch::Sender<bool>>>,
}

impl BanManager {
    pub fn new(blocklist: Arc<dyn BlocklistMap>) -> Self {
        Self { blocklist, shadow: RwLock::new(HashMap::new()), cleanup_stop: RwLock::new(None) }
    }

    /// Bans `ip` for `duration` from now. Idempotent modulo expiry
    /// extension: re-banning with a shorter remaining duration is a no-op.
    pub fn ban(&self, ip: Ipv4Addr, duration: Duration) -> Result<()> {
        let expires_at = now_unix().saturating_add(duration.as_secs());

        let should_write = {
            let shadow = self.shadow.read().map_err(|_| ClassifierError::Ban {
                detail: "shadow lock poisoned".to_string(),
            })?;
            shadow.get(&ip).is_none_or(|&existing| expires_at > existing)
        };
        if !should_write {
            return Ok(());
        }

        self.blocklist
            .put(ip, expires_at)
            .map_err(|e| ClassifierError::Ban { detail: e.to_string() })?;

        let mut shadow = self.shadow.write().map_err(|_| ClassifierError::Ban {
            detail: "shadow lock poisoned".to_string(),
        })?;
        let entry = shadow.entry(ip).or_insert(0);
        *entry = (*entry).max(expires_at);
        debug!(%ip, expires_at, "ban recorded");
        Ok(())
    }

    /// True iff the shadow holds a not-yet-expired ban for `ip`.
    pub fn is_banned(&self, ip: Ipv4Addr) -> bool {
        let Ok(shadow) = self.shadow.read() else { return false };
        shadow.get(&ip).is_some_and(|&expires_at| expires_at > now_unix())
    }

    pub fn count(&self) -> usize {
        self.shadow.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Removes every shadow entry whose expiry has passed, deleting it from
    /// the kernel map too. A kernel-delete failure skips that entry (it
    /// stays banned until the next sweep) rather than aborting the sweep.
    pub fn cleanup_expired(&self) -> usize {
        let now = now_unix();
        let expired: Vec<Ipv4Addr> = {
            let Ok(shadow) = self.shadow.read() else { return 0 };
            shadow.iter().filter(|&(_, &exp)| exp <= now).map(|(&ip, _)| ip).collect()
        };

        let mut removed = 0usize;
        let mut failed = 0usize;
        for ip in expired {
            match self.blocklist.delete(ip) {
                Ok(()) => {
                    if let Ok(mut shadow) = self.shadow.write() {
                        shadow.remove(&ip);
                    }
                    removed += 1;
                }
                Err(e) => {
                    warn!(%ip, error = %e, "cleanup: failed to delete expired ban from kernel map");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            warn!(failed, "cleanup sweep completed with unresolved entries");
        }
        removed
    }

    /// Spawns a cooperative background task invoking `cleanup_expired` every
    /// `interval`. Calling this twice replaces the previous task's stop
    /// signal, but does not stop the old task — callers should pair this
    /// with exactly one `stop_periodic_cleanup`.
    pub fn start_periodic_cleanup(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let (tx, mut rx) = watch::channel(false);
        if let Ok(mut guard) = self.cleanup_stop.write() {
            *guard = Some(tx);
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = manager.cleanup_expired();
                        if removed > 0 {
                            info!(removed, "cleanup sweep removed expired bans");
                        }
                    }
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Idempotent: signals the running cleanup task (if any) to stop.
    /// Returns promptly; does not wait for the task to exit.
    pub fn stop_periodic_cleanup(&self) {
        if let Ok(guard) = self.cleanup_stop.read() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::InMemoryBlocklistMap;

    fn manager() -> BanManager {
        BanManager::new(Arc::new(InMemoryBlocklistMap::new()))
    }

    #[test]
    fn ban_then_is_banned() {
        let m = manager();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        m.ban(ip, Duration::from_secs(60)).unwrap();
        assert!(m.is_banned(ip));
        assert_eq!(m.count(), 1);
    }

    /// Invariant 4: max(expires_at) wins across repeated bans.
    #[test]
    fn repeated_ban_extends_but_never_shortens_expiry() {
        let m = manager();
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        m.ban(ip, Duration::from_secs(100)).unwrap();
        m.ban(ip, Duration::from_secs(10)).unwrap(); // shorter: no-op
        let long_expiry = m.blocklist.lookup(ip).unwrap();
        m.ban(ip, Duration::from_secs(200)).unwrap(); // longer: extends
        let longer_expiry = m.blocklist.lookup(ip).unwrap();
        assert!(longer_expiry > long_expiry);
    }

    #[test]
    fn cleanup_on_empty_shadow_is_zero_and_inert() {
        let m = manager();
        assert_eq!(m.cleanup_expired(), 0);
        assert_eq!(m.count(), 0);
    }

    #[test]
    fn cleanup_removes_only_expired_entries() {
        let m = manager();
        let expired_ip = Ipv4Addr::new(10, 0, 0, 2);
        let active_ip = Ipv4Addr::new(10, 0, 0, 3);

        m.blocklist.put(expired_ip, 1).unwrap(); // already in the past
        m.shadow.write().unwrap().insert(expired_ip, 1);
        m.ban(active_ip, Duration::from_secs(3600)).unwrap();

        let removed = m.cleanup_expired();
        assert_eq!(removed, 1);
        assert!(!m.is_banned(expired_ip));
        assert!(m.is_banned(active_ip));
    }

    /// S9 — concurrent bans on the same IP converge to max(expires_at), one
    /// shadow entry.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bans_on_same_ip_converge_to_max_expiry() {
        let manager = Arc::new(manager());
        let ip = Ipv4Addr::new(10, 0, 0, 4);

        let mut handles = Vec::new();
        for secs in [10u64, 500, 50, 1000, 200] {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.ban(ip, Duration::from_secs(secs)).unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(manager.count(), 1);
        assert!(manager.is_banned(ip));
    }
}
