//! Backend integration tests. They need a reachable Redis (REDIS_URL or
//! localhost) and are ignored by default; run with `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cache::CacheClient;
use crate::config::CacheConfig;
use crate::store::{CounterStore, RedisCounterStore};

const WINDOW: Duration = Duration::from_secs(60);

async fn connect() -> RedisCounterStore {
    let cache = CacheClient::new(CacheConfig::from_env()).expect("valid config");
    cache.initialize().await.expect("redis reachable");
    RedisCounterStore::new(Arc::new(cache))
}

fn unique_key(policy: &str) -> String {
    format!("rate_limit:{policy}:test:{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn test_backend_hit_counts_and_stamps_the_window() {
    let store = connect().await;
    let key = unique_key("general");

    for expected in 1..=3u64 {
        let slot = store.hit(&key, WINDOW).await.unwrap();
        assert_eq!(slot.count, expected);
        assert!(slot.reset_after > Duration::ZERO);
        assert!(slot.reset_after <= WINDOW);
    }

    store.reset(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn test_backend_keys_are_isolated() {
    let store = connect().await;
    let first = unique_key("auth");
    let second = unique_key("auth");

    store.hit(&first, WINDOW).await.unwrap();
    store.hit(&first, WINDOW).await.unwrap();
    let slot = store.hit(&second, WINDOW).await.unwrap();
    assert_eq!(slot.count, 1);

    store.reset(&first).await.unwrap();
    store.reset(&second).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn test_backend_refund_decrements() {
    let store = connect().await;
    let key = unique_key("auth");

    store.hit(&key, WINDOW).await.unwrap();
    store.hit(&key, WINDOW).await.unwrap();
    store.refund(&key).await.unwrap();

    let slot = store.hit(&key, WINDOW).await.unwrap();
    assert_eq!(slot.count, 2);

    store.reset(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running redis"]
async fn test_backend_reset_starts_a_fresh_window() {
    let store = connect().await;
    let key = unique_key("password_reset");

    store.hit(&key, WINDOW).await.unwrap();
    store.reset(&key).await.unwrap();

    let slot = store.hit(&key, WINDOW).await.unwrap();
    assert_eq!(slot.count, 1);

    store.reset(&key).await.unwrap();
}
