//! Tests for single-shot promises.
//!
//! `wait` takes the promise by value, so waiting twice on one handle does
//! not compile. That is the single-use contract; there is nothing to test
//! at runtime for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use jobq::{Error, Promise};

#[tokio::test]
async fn wait_returns_the_value() {
    let promise = Promise::spawn(|| async { Ok(42) });
    assert_eq!(promise.wait().await.unwrap(), 42);
}

#[tokio::test]
async fn wait_returns_the_error() {
    let promise: Promise<u32> =
        Promise::spawn(|| async { Err(anyhow::anyhow!("upstream unavailable")) });

    match promise.wait().await {
        Err(Error::Task(e)) => assert_eq!(e.to_string(), "upstream unavailable"),
        other => panic!("expected Task error, got {other:?}"),
    }
}

#[tokio::test]
async fn panic_is_delivered_as_error() {
    let promise: Promise<u32> = Promise::spawn(|| async {
        if true {
            panic!("lost the plot");
        }
        Ok(1)
    });

    match promise.wait().await {
        Err(Error::Panicked(msg)) => assert!(msg.contains("lost the plot")),
        other => panic!("expected Panicked, got {other:?}"),
    }
}

#[tokio::test]
async fn blocking_computation_is_supported() {
    let promise = Promise::spawn_blocking(|| {
        std::thread::sleep(Duration::from_millis(10));
        Ok(String::from("done"))
    });
    assert_eq!(promise.wait().await.unwrap(), "done");
}

#[tokio::test]
async fn computation_starts_before_wait() {
    let started = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&started);
    let promise = Promise::spawn(move || async move {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while !started.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    promise.wait().await.unwrap();
}

#[tokio::test]
async fn computation_finishes_even_if_never_awaited() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    drop(Promise::spawn(move || async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(())
    }));

    tokio::time::timeout(Duration::from_secs(5), async {
        while !finished.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn closed_promise_reports_closed() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    let mut promise = Promise::spawn(move || async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        flag.store(true, Ordering::SeqCst);
        Ok(7)
    });

    promise.close();
    assert!(matches!(promise.wait().await, Err(Error::PromiseClosed)));

    // Closing does not cancel the computation.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_promises_resolve_independently() {
    let promises: Vec<_> = (0..10u64)
        .map(|i| {
            Promise::spawn(move || async move {
                tokio::time::sleep(Duration::from_millis(10 * (10 - i))).await;
                Ok(i * i)
            })
        })
        .collect();

    let mut results = Vec::new();
    for promise in promises {
        results.push(promise.wait().await.unwrap());
    }
    assert_eq!(results, (0..10u64).map(|i| i * i).collect::<Vec<_>>());
}
