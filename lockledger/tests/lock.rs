#[path = "common/support.rs"]
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use lockledger::CancellationToken;
use support::*;
use tokio::{task::JoinSet, time::Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_never_hold_the_lock_together() {
    let store = MemoryStore::new();
    let holders = Arc::new(AtomicUsize::new(0));
    let max_holders = Arc::new(AtomicUsize::new(0));
    let acquisitions = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let target = memory_target(&store);
        let holders = holders.clone();
        let max_holders = max_holders.clone();
        let acquisitions = acquisitions.clone();
        tasks.spawn(async move {
            let guard = target.lock().await.expect("acquire");
            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
            max_holders.fetch_max(now, Ordering::SeqCst);
            acquisitions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            holders.fetch_sub(1, Ordering::SeqCst);
            guard.unlock().await.expect("release");
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.expect("task");
    }

    assert_eq!(max_holders.load(Ordering::SeqCst), 1);
    assert_eq!(acquisitions.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn first_acquisition_creates_the_lock_document() {
    let store = MemoryStore::new();
    let target = memory_target(&store);
    assert_eq!(target.lock_holder().await.expect("holder"), None);

    let guard = target.lock().await.expect("acquire");
    assert_eq!(target.lock_holder().await.expect("holder").as_deref(), Some(guard.token()));
    assert_eq!(guard.collection(), "_migrations_lock");

    guard.unlock().await.expect("release");
    assert_eq!(target.lock_holder().await.expect("holder"), None);
}

#[tokio::test]
async fn unlock_is_idempotent() {
    let store = MemoryStore::new();
    let target = memory_target(&store);

    let guard = target.lock().await.expect("acquire");
    guard.unlock().await.expect("first release");
    guard.unlock().await.expect("second release");

    let again = target.lock().await.expect("re-acquire after release");
    again.unlock().await.expect("release");
}

#[tokio::test]
async fn contended_lock_times_out_with_a_distinct_error() {
    let store = MemoryStore::new();
    let holder = memory_target(&store);
    let _guard = holder.lock().await.expect("acquire");

    let config = fast_config()
        .with_lock_timeout(Duration::from_millis(100))
        .with_poll_interval(Duration::from_millis(20));
    let waiter = Target::new(store.clone(), config).expect("target");

    let started = Instant::now();
    let err = waiter.lock().await.err().expect("timeout");
    assert!(err.is_lock_timeout(), "unexpected error: {err}");
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn lock_timeout_shorter_than_poll_interval_still_applies() {
    let store = MemoryStore::new();
    let holder = memory_target(&store);
    let _guard = holder.lock().await.expect("acquire");

    let config = TargetConfig::default().with_lock_timeout(Duration::from_millis(500));
    let waiter = Target::new(store.clone(), config).expect("short lock timeout is valid");

    let started = Instant::now();
    let err = waiter.lock().await.err().expect("timeout");
    let waited = started.elapsed();
    assert!(err.is_lock_timeout(), "unexpected error: {err}");
    assert!(waited >= Duration::from_millis(500));
    assert!(waited < Duration::from_millis(950), "waited a full poll interval: {waited:?}");
}

#[tokio::test]
async fn cancellation_ends_a_waiting_acquisition() {
    let store = MemoryStore::new();
    let holder = memory_target(&store);
    let guard = holder.lock().await.expect("acquire");

    let cancel = CancellationToken::new();
    let waiter = memory_target(&store).with_cancellation(cancel.clone());
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = waiter.lock().await.err().expect("cancelled");
    assert!(err.is_cancelled(), "unexpected error: {err}");
    assert!(!err.is_lock_timeout());
    trigger.await.expect("trigger");

    assert_eq!(holder.lock_holder().await.expect("holder").as_deref(), Some(guard.token()));
}

#[tokio::test]
async fn stale_guard_does_not_release_a_newer_holder() {
    let store = MemoryStore::new();
    let target = memory_target(&store);

    let stale = target.lock().await.expect("first holder");
    let cleared = target.force_unlock().await.expect("force unlock");
    assert_eq!(cleared.as_deref(), Some(stale.token()));

    let current = target.lock().await.expect("second holder");
    stale.unlock().await.expect("stale release is a no-op");
    assert_eq!(target.lock_holder().await.expect("holder").as_deref(), Some(current.token()));

    current.unlock().await.expect("release");
}

#[tokio::test]
async fn waiter_acquires_once_the_holder_releases() {
    let store = MemoryStore::new();
    let holder = memory_target(&store);
    let guard = holder.lock().await.expect("acquire");

    let waiter = memory_target(&store);
    let pending = tokio::spawn(async move { waiter.lock().await.map(|guard| guard.token().to_string()) });

    tokio::time::sleep(Duration::from_millis(30)).await;
    guard.unlock().await.expect("release");

    let token = pending.await.expect("task").expect("acquired after release");
    assert_ne!(token, guard.token());
}
