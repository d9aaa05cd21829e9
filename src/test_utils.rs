// src/test_utils.rs

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{RateGateError, Result};
use crate::store::{CounterStore, MemoryCounterStore, WindowSlot};

/// Store that fails every call; exercises fail-open paths
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn hit(&self, _key: &str, _window: Duration) -> Result<WindowSlot> {
        Err(RateGateError::Internal("store offline".to_string()))
    }

    async fn refund(&self, _key: &str) -> Result<()> {
        Err(RateGateError::Internal("store offline".to_string()))
    }

    async fn reset(&self, _key: &str) -> Result<()> {
        Err(RateGateError::Internal("store offline".to_string()))
    }
}

/// Memory-backed store that counts hit and refund calls
#[derive(Debug)]
pub struct RecordingStore {
    inner: MemoryCounterStore,
    hits: AtomicU64,
    refunds: AtomicU64,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCounterStore::new(crate::config::MemoryConfig::default()),
            hits: AtomicU64::new(0),
            refunds: AtomicU64::new(0),
        }
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn refund_count(&self) -> u64 {
        self.refunds.load(Ordering::SeqCst)
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for RecordingStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSlot> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.inner.hit(key, window).await
    }

    async fn refund(&self, key: &str) -> Result<()> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        self.inner.refund(key).await
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.inner.reset(key).await
    }
}
