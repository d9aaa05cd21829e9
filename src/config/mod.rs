// src/config/mod.rs

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Configuration for the cache backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend connection URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Optional credential; overrides any password embedded in the URL
    #[serde(default)]
    pub password: Option<String>,

    /// Logical database index
    #[serde(default)]
    pub db: i64,

    /// Maximum reconnection attempts before the client gives up
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: usize,

    /// Timeout for each connection attempt
    #[serde(default = "default_conn_timeout", with = "duration_serde")]
    pub connection_timeout: Duration,
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_max_reconnect_attempts() -> usize {
    3
}

fn default_conn_timeout() -> Duration {
    Duration::from_secs(2)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            password: None,
            db: 0,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connection_timeout: default_conn_timeout(),
        }
    }
}

impl CacheConfig {
    /// Build a configuration from the environment, with defaults suitable
    /// for local development.
    ///
    /// Recognized variables: REDIS_URL, REDIS_PASSWORD, REDIS_DB,
    /// REDIS_MAX_RETRIES.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("REDIS_URL") {
            if !url.is_empty() {
                config.url = url;
            }
        }
        if let Ok(password) = env::var("REDIS_PASSWORD") {
            if !password.is_empty() {
                config.password = Some(password);
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db) = db.parse() {
                config.db = db;
            }
        }
        if let Ok(attempts) = env::var("REDIS_MAX_RETRIES") {
            if let Ok(attempts) = attempts.parse() {
                config.max_reconnect_attempts = attempts;
            }
        }

        config
    }
}

/// Configuration for the in-process fallback counter store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Entry count that triggers a sweep of expired counters when a new key
    /// arrives. A sweep trigger, not a hard bound: live counters are never
    /// evicted
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

// Helper module to serialize/deserialize Duration with serde
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
