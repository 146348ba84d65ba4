//! Redis backend for [`rota_core::LockCapability`].
//!
//! Acquisition is `SET key <holder> NX PX <ttl>`, the advisory check is a
//! plain `GET`, and release is a compare-and-delete script so an instance
//! never frees a key another instance took after its own lease expired.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, ErrorKind, RedisError, Script, aio::MultiplexedConnection};
use rota_core::{LockCapability, LockError, holder_token};
use tracing::{debug, trace};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Lock handle over one multiplexed Redis connection.
///
/// Cloning shares the connection and the holder token; use
/// [`RedisLock::with_holder`] to model a separate instance.
#[derive(Clone)]
pub struct RedisLock {
    conn: MultiplexedConnection,
    holder: String,
    release: Script,
}

impl RedisLock {
    /// Connect to `url` (`redis://host:port/db`).
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(url).map_err(map_err)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_err)?;
        debug!(target: "rota.redis", %url, "connected");
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            holder: holder_token(),
            release: Script::new(RELEASE_SCRIPT),
        }
    }

    /// Same connection, different holder token.
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

#[async_trait]
impl LockCapability for RedisLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let ttl_ms = px_millis(ttl)?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&self.holder)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(map_err)?;

        let acquired = reply.is_some();
        trace!(target: "rota.redis", key, ttl_ms, acquired, "set nx");
        Ok(acquired)
    }

    async fn is_held(&self, key: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.map_err(map_err)?;
        Ok(value.is_some_and(|v| !v.is_empty()))
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .release
            .key(key)
            .arg(&self.holder)
            .invoke_async(&mut conn)
            .await
            .map_err(map_err)?;

        debug!(target: "rota.redis", key, removed = removed > 0, "release");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

fn map_err(err: RedisError) -> LockError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
        || err.kind() == ErrorKind::ClusterDown
    {
        LockError::Unavailable(err.to_string())
    } else {
        LockError::Backend(err.to_string())
    }
}

/// `PX` argument for `ttl`: at least one millisecond, at most what Redis accepts.
fn px_millis(ttl: Duration) -> Result<i64, LockError> {
    i64::try_from(ttl.as_millis().max(1))
        .map_err(|_| LockError::Backend(format!("lock ttl {ttl:?} is out of range for PX")))
}
