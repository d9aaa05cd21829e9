// src/store/redis.rs

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheClient;
use crate::error::Result;
use crate::store::{CounterStore, WindowSlot};

/// Backend-backed counter store.
///
/// The increment and the TTL read run as one transaction; the expiry is
/// stamped only when the increment created the key, so the window boundary
/// is fixed by the first request in the window.
#[derive(Debug)]
pub struct RedisCounterStore {
    cache: Arc<CacheClient>,
}

impl RedisCounterStore {
    pub fn new(cache: Arc<CacheClient>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSlot> {
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("INCR").arg(key).cmd("TTL").arg(key);
        let (count, ttl): (i64, i64) = self.cache.transaction(pipe).await?;

        let ttl_secs = if ttl < 0 {
            // Fresh key, or a counter that lost its expiry: stamp the window
            let mut expire = redis::cmd("EXPIRE");
            expire.arg(key).arg(window.as_secs() as i64);
            let _: bool = self.cache.command(expire).await?;
            window.as_secs()
        } else {
            ttl as u64
        };

        Ok(WindowSlot {
            count: count.max(0) as u64,
            reset_after: Duration::from_secs(ttl_secs),
        })
    }

    async fn refund(&self, key: &str) -> Result<()> {
        let mut decr = redis::cmd("DECR");
        decr.arg(key);
        let count: i64 = self.cache.command(decr).await?;

        if count < 0 {
            // The window expired between increment and refund; drop the
            // stray negative key rather than leave it without a TTL
            let mut del = redis::cmd("DEL");
            del.arg(key);
            let _: i64 = self.cache.command(del).await?;
        }
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut del = redis::cmd("DEL");
        del.arg(key);
        let _: i64 = self.cache.command(del).await?;
        Ok(())
    }
}
