// src/cache/backoff.rs

use std::time::Duration;

/// Base delay for the first reconnection attempt
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Ceiling for reconnection delays
pub const MAX_DELAY: Duration = Duration::from_secs(3);

/// Reconnect delay schedule for the cache client.
///
/// Each failed attempt yields a delay scaling with the attempt count, capped
/// at [`MAX_DELAY`], with jitter between 50% and 100% of the capped value.
/// Once attempts exceed the configured maximum, `next_delay` returns `None`
/// and the caller abandons reconnection.
#[derive(Debug)]
pub struct ReconnectBackoff {
    attempt: usize,
    max_attempts: usize,
}

impl ReconnectBackoff {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// Get the delay before the next attempt, or None once attempts are
    /// exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;

        if self.attempt > self.max_attempts {
            return None;
        }

        let scaled_ms = BASE_DELAY.as_millis() as u64 * self.attempt as u64;
        let capped_ms = scaled_ms.min(MAX_DELAY.as_millis() as u64);

        // Jitter: random value between 50% and 100% of the capped delay
        let jitter = rand::random::<f64>() * 0.5 + 0.5;

        Some(Duration::from_millis((capped_ms as f64 * jitter) as u64))
    }

    /// Number of attempts made so far
    pub fn attempts(&self) -> usize {
        self.attempt
    }

    /// Reset the schedule to start from the beginning
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
