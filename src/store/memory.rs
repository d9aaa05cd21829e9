// src/store/memory.rs

// In-process counter store, used when the cache backend is unavailable.
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::store::{CounterStore, WindowSlot};

#[derive(Debug)]
struct MemoryCounter {
    count: u64,
    reset_at: Instant,
}

/// In-process counter store.
///
/// Increment-and-check runs under a single lock so the count and the window
/// boundary stay consistent. Expired windows are evicted lazily on next
/// access; a sweep also runs when the map reaches `max_entries` and a new
/// key arrives. Live counters are never evicted, so when every entry is
/// still inside its window the map grows past `max_entries` rather than
/// dropping enforcement for new keys. Every entry carries a window, so
/// growth is bounded by the set of keys active within one window.
#[derive(Debug)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, MemoryCounter>>,
    config: MemoryConfig,
}

impl MemoryCounterStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Increment-and-check without going through the async seam. Infallible;
    /// the adapter relies on this when degrading a backend failure.
    pub fn hit_local(&self, key: &str, window: Duration) -> WindowSlot {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        if entries.len() >= self.config.max_entries && !entries.contains_key(key) {
            entries.retain(|_, counter| counter.reset_at > now);
        }

        let counter = entries.entry(key.to_string()).or_insert(MemoryCounter {
            count: 0,
            reset_at: now + window,
        });

        if counter.reset_at <= now {
            // Window elapsed; start a fresh one
            counter.count = 0;
            counter.reset_at = now + window;
        }
        counter.count += 1;

        WindowSlot {
            count: counter.count,
            reset_after: counter.reset_at.saturating_duration_since(now),
        }
    }

    /// Undo one increment, never dropping below zero
    pub fn refund_local(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(counter) = entries.get_mut(key) {
            counter.count = counter.count.saturating_sub(1);
        }
    }

    pub fn reset_local(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowSlot> {
        Ok(self.hit_local(key, window))
    }

    async fn refund(&self, key: &str) -> Result<()> {
        self.refund_local(key);
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.reset_local(key);
        Ok(())
    }
}
