// src/cache/mod.rs

pub mod backoff;

#[cfg(test)]
mod tests;

use redis::aio::ConnectionManager;
use redis::{Client, Cmd, FromRedisValue, IntoConnectionInfo, Pipeline};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use backoff::ReconnectBackoff;

/// Lifecycle state of the backend connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Error => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Error,
        }
    }
}

/// Process-wide cache operation counters
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl CacheCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero all counters
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64 * 100.0
        } else {
            0.0
        };

        CounterSnapshot {
            hits,
            misses,
            errors: self.errors.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

/// Point-in-time view of the cache counters
#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Hit rate as a percentage of lookups
    pub hit_rate: f64,
}

/// Stats payload served to operational tooling
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    pub connected: bool,
    pub counters: CounterSnapshot,
    /// Backend-reported INFO metrics, one entry per line split on the
    /// first colon
    pub info: HashMap<String, String>,
}

/// Single process-wide handle to the backend key-value store.
///
/// The client owns the connection lifecycle. Consumers share it read-only
/// and issue commands through [`CacheClient::command`] (strict) or
/// [`CacheClient::command_with_fallback`] (degrades to `None` on any
/// failure), declaring their failure tolerance at the call site.
pub struct CacheClient {
    config: CacheConfig,
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    state: AtomicU8,
    counters: CacheCounters,
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("url", &self.config.url)
            .field("db", &self.config.db)
            .field("state", &self.state())
            .finish()
    }
}

impl CacheClient {
    /// Creates the client without performing any I/O. Call
    /// [`CacheClient::initialize`] to establish the connection.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let mut info = config
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        if let Some(password) = &config.password {
            info.redis.password = Some(password.clone());
        }
        if config.db != 0 {
            info.redis.db = config.db;
        }

        let client = Client::open(info).map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            config,
            client,
            connection: RwLock::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            counters: CacheCounters::default(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.swap(next.as_u8(), Ordering::SeqCst);
        if prev != next.as_u8() {
            debug!(
                from = ?ConnectionState::from_u8(prev),
                to = ?next,
                "cache connection state changed"
            );
        }
    }

    /// Establish the backend connection. Idempotent while connected: an
    /// already-established connection is reused, never duplicated. After a
    /// connection-class failure mid-session a new call drops the stale
    /// handle and runs the reconnect loop again; this is the only way back
    /// to an available client.
    ///
    /// Failed attempts retry with an attempt-scaled, capped delay; once the
    /// configured maximum is exceeded the client gives up, stays in the
    /// `Error` state and returns the last connection error. Callers decide
    /// whether that is fatal.
    pub async fn initialize(&self) -> Result<(), CacheError> {
        if self.state() == ConnectionState::Connected
            && self.connection.read().unwrap().is_some()
        {
            return Ok(());
        }

        // A failed session can leave a handle behind; drop it so the
        // reconnect loop starts clean
        self.connection.write().unwrap().take();

        self.set_state(ConnectionState::Connecting);
        let mut backoff = ReconnectBackoff::new(self.config.max_reconnect_attempts);

        loop {
            match self.try_connect().await {
                Ok(manager) => {
                    let mut slot = self.connection.write().unwrap();
                    if slot.is_none() {
                        *slot = Some(manager);
                    }
                    drop(slot);
                    self.set_state(ConnectionState::Connected);
                    info!(url = %self.config.url, db = self.config.db, "cache backend connected");
                    return Ok(());
                }
                Err(err) => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            attempt = backoff.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "cache connection attempt failed, retrying"
                        );
                        time::sleep(delay).await;
                    }
                    None => {
                        self.set_state(ConnectionState::Error);
                        error!(
                            attempts = backoff.attempts(),
                            error = %err,
                            "cache backend unreachable, giving up"
                        );
                        return Err(err);
                    }
                },
            }
        }
    }

    async fn try_connect(&self) -> Result<ConnectionManager, CacheError> {
        let connect = ConnectionManager::new(self.client.clone());

        match time::timeout(self.config.connection_timeout, connect).await {
            Ok(result) => result.map_err(|e| CacheError::Connection(e.to_string())),
            Err(_) => Err(CacheError::Connection(format!(
                "connection to {} timed out after {:?}",
                self.config.url, self.config.connection_timeout
            ))),
        }
    }

    /// True only when the state is connected and a live handle exists.
    /// Guard for every command dispatch.
    pub fn is_available(&self) -> bool {
        self.state() == ConnectionState::Connected && self.connection.read().unwrap().is_some()
    }

    // The manager is cheap to clone and multiplexes concurrent commands,
    // so each dispatch takes its own handle.
    fn handle(&self) -> Option<ConnectionManager> {
        self.connection.read().unwrap().clone()
    }

    /// Strict mode: fails with [`CacheError::Unavailable`] when not
    /// connected, otherwise dispatches the command and propagates backend
    /// errors after logging them. No retries happen here; retry and backoff
    /// live in the connection layer.
    pub async fn command<T: FromRedisValue>(&self, cmd: Cmd) -> Result<T, CacheError> {
        if !self.is_available() {
            self.counters.record_error();
            return Err(CacheError::Unavailable);
        }

        let mut conn = match self.handle() {
            Some(conn) => conn,
            None => {
                self.counters.record_error();
                return Err(CacheError::Unavailable);
            }
        };

        match cmd.query_async(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.counters.record_error();
                let err = CacheError::from(err);
                if err.is_connection() {
                    self.set_state(ConnectionState::Error);
                }
                error!(error = %err, "cache command failed");
                Err(err)
            }
        }
    }

    /// Executes a pipeline as a single transaction, with the same
    /// availability guard and error handling as [`CacheClient::command`].
    pub async fn transaction<T: FromRedisValue>(&self, pipe: Pipeline) -> Result<T, CacheError> {
        if !self.is_available() {
            self.counters.record_error();
            return Err(CacheError::Unavailable);
        }

        let mut conn = match self.handle() {
            Some(conn) => conn,
            None => {
                self.counters.record_error();
                return Err(CacheError::Unavailable);
            }
        };

        match pipe.query_async(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.counters.record_error();
                let err = CacheError::from(err);
                if err.is_connection() {
                    self.set_state(ConnectionState::Error);
                }
                error!(error = %err, "cache transaction failed");
                Err(err)
            }
        }
    }

    /// Degraded mode: any failure, including unavailability, is logged and
    /// swallowed. Call sites that must not fail the request use this.
    pub async fn command_with_fallback<T: FromRedisValue>(&self, cmd: Cmd) -> Option<T> {
        match self.command(cmd).await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "cache command degraded to null");
                None
            }
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: Option<String> = self.command(cmd).await?;

        match &value {
            Some(_) => self.counters.record_hit(),
            None => self.counters.record_miss(),
        }
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs());
        }
        let _: () = self.command(cmd).await?;

        self.counters.record_set();
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed: i64 = self.command(cmd).await?;

        self.counters.record_delete();
        Ok(removed > 0)
    }

    pub async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut cmd = redis::cmd("INCR");
        cmd.arg(key);
        self.command(cmd).await
    }

    /// Drops the connection handle. In-flight commands hold their own clone
    /// of the manager and run to completion.
    pub async fn close(&self) {
        let dropped = self.connection.write().unwrap().take();
        if dropped.is_some() {
            info!("cache connection closed");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    // Same state transition a connection-class command error performs,
    // without needing to induce an I/O failure on a live session
    #[cfg(test)]
    pub(crate) fn mark_connection_error(&self) {
        self.set_state(ConnectionState::Error);
    }

    /// Connectivity plus counters plus the parsed backend INFO payload.
    /// INFO failures degrade to an empty metrics map.
    pub async fn stats(&self) -> CacheStatsReport {
        let info = match self.command_with_fallback::<String>(redis::cmd("INFO")).await {
            Some(payload) => parse_info(&payload),
            None => HashMap::new(),
        };

        CacheStatsReport {
            connected: self.is_available(),
            counters: self.counters.snapshot(),
            info,
        }
    }
}

/// Parses a backend INFO payload: one `key:value` entry per line, section
/// headers and blank lines skipped, each line split on the first colon.
pub fn parse_info(payload: &str) -> HashMap<String, String> {
    payload
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once(':')?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
