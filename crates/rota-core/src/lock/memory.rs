use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{LockError, instance::holder_token, lock::LockCapability};

struct Lease {
    holder: Arc<str>,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process lock store with TTL expiry.
///
/// Every handle carries its own holder token, so handles created with
/// [`MemoryLock::handle`] behave like separate instances sharing one backend:
/// they compete for the same keys and a handle only releases what it holds.
/// Expiry follows the tokio clock, which makes TTLs controllable in tests.
#[derive(Clone)]
pub struct MemoryLock {
    store: Arc<Mutex<HashMap<String, Lease>>>,
    holder: Arc<str>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            holder: holder_token().into(),
        }
    }

    /// New handle on the same store with a distinct holder token.
    pub fn handle(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            holder: holder_token().into(),
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Holder token of the live lease on `key`, if any.
    pub fn holder_of(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.leases()
            .get(key)
            .filter(|lease| lease.is_live(now))
            .map(|lease| lease.holder.to_string())
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<String, Lease>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockCapability for MemoryLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut leases = self.leases();

        if leases.get(key).is_some_and(|lease| lease.is_live(now)) {
            trace!(key, "lease held, acquire rejected");
            return Ok(false);
        }

        let Some(expires_at) = now.checked_add(ttl) else {
            return Err(LockError::Backend(format!("lease ttl {ttl:?} is out of range")));
        };
        leases.insert(
            key.to_string(),
            Lease {
                holder: Arc::clone(&self.holder),
                expires_at,
            },
        );
        debug!(key, ttl_ms = millis(ttl), holder = %self.holder, "lease acquired");
        Ok(true)
    }

    async fn is_held(&self, key: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        Ok(self.leases().get(key).is_some_and(|lease| lease.is_live(now)))
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let now = Instant::now();
        let mut leases = self.leases();

        let releasable = match leases.get(key) {
            None => return Ok(()),
            Some(lease) => *lease.holder == *self.holder || !lease.is_live(now),
        };
        if releasable {
            leases.remove(key);
            debug!(key, holder = %self.holder, "lease released");
        } else {
            debug!(key, holder = %self.holder, "lease owned by another holder, release ignored");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
