// src/store/mod.rs

pub mod memory;
pub mod redis;

#[cfg(test)]
mod tests;

pub use memory::MemoryCounterStore;
pub use redis::RedisCounterStore;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::CacheClient;
use crate::config::{CacheConfig, MemoryConfig};
use crate::error::Result;

/// Counter state for one (policy, key) pair in the current window
#[derive(Debug, Clone)]
pub struct WindowSlot {
    /// Requests seen in the window, including the one being checked
    pub count: u64,
    /// Time until the window resets
    pub reset_after: Duration,
}

/// Seam between the request gate and whichever counting backend is live
#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    /// Atomically increments the counter for `key`, starting a fresh window
    /// with TTL `window` when the key is new or expired.
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSlot>;

    /// Undoes one increment. Used by policies that exclude certain request
    /// outcomes from the quota.
    async fn refund(&self, key: &str) -> Result<()>;

    /// Clears the counter for `key`.
    async fn reset(&self, key: &str) -> Result<()>;
}

#[derive(Debug)]
enum Backend {
    Redis {
        store: RedisCounterStore,
        fallback: MemoryCounterStore,
    },
    Memory(MemoryCounterStore),
}

/// Store adapter with graceful degradation.
///
/// Rate limiting opens its own backend connection, independent of the shared
/// cache client, so the two fail in isolation. If that connection cannot be
/// established at startup, the adapter logs a warning and serves from the
/// in-process store for the remaining process lifetime. When Redis-backed, a
/// command error degrades that single call to the in-process map instead of
/// failing the request, so enforcement always yields a count.
///
/// Limitation: in-process counters are per-instance. Under a multi-instance
/// deployment, memory mode silently degrades the global quota into a
/// per-instance quota.
#[derive(Debug)]
pub struct RateLimitStore {
    backend: Backend,
}

impl RateLimitStore {
    /// Attempt a dedicated backend connection for rate limiting. Failure is
    /// non-fatal; the adapter falls back to per-process counting.
    pub async fn connect(config: CacheConfig) -> Self {
        let client = match CacheClient::new(config) {
            Ok(client) => client,
            Err(err) => {
                warn!(
                    error = %err,
                    "invalid cache configuration, rate limit quotas are now per-instance"
                );
                return Self::in_memory();
            }
        };

        match client.initialize().await {
            Ok(()) => {
                info!("rate limit store using cache backend");
                Self {
                    backend: Backend::Redis {
                        store: RedisCounterStore::new(Arc::new(client)),
                        fallback: MemoryCounterStore::new(MemoryConfig::default()),
                    },
                }
            }
            Err(err) => {
                warn!(
                    error = %err,
                    "cache backend unreachable, rate limit quotas are now per-instance"
                );
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryCounterStore::new(MemoryConfig::default())),
        }
    }

    /// True when counters are shared across instances via the backend
    pub fn is_distributed(&self) -> bool {
        matches!(self.backend, Backend::Redis { .. })
    }
}

#[async_trait]
impl CounterStore for RateLimitStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSlot> {
        match &self.backend {
            Backend::Redis { store, fallback } => match store.hit(key, window).await {
                Ok(slot) => Ok(slot),
                Err(err) => {
                    warn!(key, error = %err, "backend hit failed, serving from in-process counter");
                    Ok(fallback.hit_local(key, window))
                }
            },
            Backend::Memory(store) => Ok(store.hit_local(key, window)),
        }
    }

    async fn refund(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Redis { store, fallback } => {
                if let Err(err) = store.refund(key).await {
                    warn!(key, error = %err, "backend refund failed, refunding in-process counter");
                    fallback.refund_local(key);
                }
            }
            Backend::Memory(store) => store.refund_local(key),
        }
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Redis { store, fallback } => {
                if let Err(err) = store.reset(key).await {
                    warn!(key, error = %err, "backend reset failed");
                }
                fallback.reset_local(key);
            }
            Backend::Memory(store) => store.reset_local(key),
        }
        Ok(())
    }
}
