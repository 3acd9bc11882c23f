//! Tests for the expiring cache store and `remember`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jobq::{CacheStore, Error, MemoryStore, cache_key, remember};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Stats {
    users: u64,
    signups_today: u64,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[test]
fn get_returns_stored_value() {
    let store = MemoryStore::new();
    store.set("greeting", b"hello".to_vec(), Duration::ZERO).unwrap();
    assert_eq!(store.get("greeting").unwrap(), b"hello");
}

#[test]
fn missing_key_is_not_found() {
    let store = MemoryStore::new();
    match store.get("nope") {
        Err(Error::NotFound(key)) => assert_eq!(key, "nope"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn entry_expires_lazily_on_read() {
    let store = MemoryStore::new();
    store
        .set("session", b"abc".to_vec(), Duration::from_millis(100))
        .unwrap();
    assert_eq!(store.get("session").unwrap(), b"abc");

    std::thread::sleep(Duration::from_millis(150));
    // Still stored until someone reads it.
    assert_eq!(store.len(), 1);

    let expired = store.get("session").unwrap_err();
    assert!(matches!(expired, Error::Expired(_)));
    assert!(expired.is_cache_miss());

    assert!(matches!(store.get("session"), Err(Error::NotFound(_))));
    assert!(store.is_empty());
}

#[test]
fn zero_ttl_clears_previous_expiry() {
    let store = MemoryStore::new();
    store
        .set("k", b"short".to_vec(), Duration::from_millis(20))
        .unwrap();
    store.set("k", b"forever".to_vec(), Duration::ZERO).unwrap();

    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(store.get("k").unwrap(), b"forever");
}

#[test]
fn unrepresentable_ttl_never_expires() {
    let store = MemoryStore::new();
    store.set("k", b"v".to_vec(), Duration::MAX).unwrap();
    assert_eq!(store.get("k").unwrap(), b"v");
}

#[test]
fn set_overwrites_value() {
    let store = MemoryStore::new();
    store.set("k", b"one".to_vec(), Duration::ZERO).unwrap();
    store.set("k", b"two".to_vec(), Duration::ZERO).unwrap();
    assert_eq!(store.get("k").unwrap(), b"two");
}

#[test]
fn delete_is_idempotent() {
    let store = MemoryStore::new();
    store
        .set("k", b"v".to_vec(), Duration::from_secs(60))
        .unwrap();
    store.delete("k").unwrap();
    store.delete("k").unwrap();
    store.delete("never-there").unwrap();
    assert!(matches!(store.get("k"), Err(Error::NotFound(_))));
}

#[test]
fn concurrent_access_is_safe() {
    let store = Arc::new(MemoryStore::new());

    std::thread::scope(|s| {
        for t in 0..8 {
            let store = Arc::clone(&store);
            s.spawn(move || {
                for i in 0..200 {
                    let key = format!("k{}", i % 16);
                    store
                        .set(&key, vec![t as u8], Duration::from_millis(5))
                        .unwrap();
                    let _ = store.get(&key);
                    if i % 7 == 0 {
                        store.delete(&key).unwrap();
                    }
                }
            });
        }
    });

    assert!(store.len() <= 16);
}

#[test]
fn cache_key_joins_arguments() {
    assert_eq!(cache_key("dashboard", &[]), "dashboard");
    assert_eq!(cache_key("user", &[&42, &"profile"]), "user:42:profile");
}

// ---------------------------------------------------------------------------
// remember
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_call_is_served_from_cache() {
    let store = MemoryStore::new();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let stats = remember(&store, "stats", Duration::from_secs(60), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(Stats {
                users: 10,
                signups_today: 2,
            })
        })
        .await
        .unwrap();
        assert_eq!(stats.users, 10);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn remember_accepts_maximum_ttl() {
    let store = MemoryStore::new();
    let n = remember(&store, "forever", Duration::MAX, || async {
        Ok::<_, anyhow::Error>(7u32)
    })
    .await
    .unwrap();
    assert_eq!(n, 7);
    assert_eq!(store.get("forever").unwrap(), b"7");
}

#[tokio::test]
async fn failures_are_not_cached() {
    let store = MemoryStore::new();
    let calls = AtomicUsize::new(0);

    let first: jobq::Result<u64> = remember(&store, "count", Duration::ZERO, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("database is down"))
    })
    .await;
    assert!(first.is_err());
    assert!(matches!(store.get("count"), Err(Error::NotFound(_))));

    let second = remember(&store, "count", Duration::ZERO, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<u64, Error>(5)
    })
    .await
    .unwrap();
    assert_eq!(second, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_value_is_recomputed() {
    let store = MemoryStore::new();
    let calls = AtomicUsize::new(0);
    let compute = || async {
        Ok::<_, Error>(calls.fetch_add(1, Ordering::SeqCst) as u64)
    };

    let first = remember(&store, "n", Duration::from_millis(30), compute).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    let second = remember(&store, "n", Duration::from_millis(30), compute).await.unwrap();

    assert_eq!((first, second), (0, 1));
}

#[tokio::test]
async fn undecodable_payload_is_recomputed_and_replaced() {
    let store = MemoryStore::new();
    store
        .set("stats", b"not json".to_vec(), Duration::ZERO)
        .unwrap();

    let stats = remember(&store, "stats", Duration::ZERO, || async {
        Ok::<_, Error>(Stats {
            users: 3,
            signups_today: 0,
        })
    })
    .await
    .unwrap();
    assert_eq!(stats.users, 3);

    let cached: Stats = serde_json::from_slice(&store.get("stats").unwrap()).unwrap();
    assert_eq!(cached, stats);
}

#[tokio::test]
async fn works_through_a_trait_object() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
    let value = remember(store.as_ref(), "v", Duration::ZERO, || async {
        Ok::<_, Error>(vec![1, 2, 3])
    })
    .await
    .unwrap();
    assert_eq!(value, vec![1, 2, 3]);
    assert_eq!(store.get("v").unwrap(), b"[1,2,3]");
}

#[tokio::test]
async fn concurrent_misses_each_compute() {
    let store = MemoryStore::new();
    let calls = AtomicUsize::new(0);
    let slow = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, Error>(1u8)
    };

    let (a, b) = tokio::join!(
        remember(&store, "race", Duration::ZERO, slow),
        remember(&store, "race", Duration::ZERO, slow),
    );
    assert_eq!((a.unwrap(), b.unwrap()), (1, 1));

    // No single-flight: both callers computed.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
