use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::LockError;

mod memory;
pub use memory::MemoryLock;

/// Distributed lock used for leader election.
///
/// Backends need atomic "set if absent with expiry", a read, and a delete.
#[async_trait]
pub trait LockCapability: Send + Sync + 'static {
    /// Atomically take `key` for `ttl`. `true` iff the caller is now the sole holder.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Non-atomic read. A missing key is `Ok(false)`, never an error.
    async fn is_held(&self, key: &str) -> Result<bool, LockError>;

    /// Give `key` back. Idempotent: an absent key is not an error.
    async fn release(&self, key: &str) -> Result<(), LockError>;

    fn name(&self) -> &'static str {
        "lock"
    }
}

pub type LockRef = Arc<dyn LockCapability>;
