#[path = "common/support.rs"]
mod support;

use lockledger::{MemorySource, MigrationSource, NamedMigration};
use support::*;
use tokio::task::JoinSet;

fn recording(ids: &[&str], log: &ExecutionLog) -> Vec<RecordingMigration> {
    ids.iter().map(|id| RecordingMigration::new(id, log)).collect()
}

#[tokio::test]
async fn second_run_applies_nothing() {
    let store = MemoryStore::new();
    let target = memory_target(&store);
    let log = ExecutionLog::default();
    let migrations = recording(&["1", "2", "3"], &log);

    let applied = run_migrations(&target, &migrations).await.expect("first run");
    assert_eq!(applied, vec!["1", "2", "3"]);
    assert_eq!(target.done().await.expect("done"), vec!["1", "2", "3"]);
    assert_eq!(target.current().await.expect("current"), "3");
    assert!(target.dirty().await.expect("dirty").is_empty());

    let applied = run_migrations(&target, &migrations).await.expect("second run");
    assert!(applied.is_empty());
    assert_eq!(log.snapshot(), vec!["1", "2", "3"]);
    assert_eq!(target.lock_holder().await.expect("holder"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runners_apply_each_migration_once_in_order() {
    let store = MemoryStore::new().with_latency(Duration::from_millis(1));
    let log = ExecutionLog::default();

    let mut runners = JoinSet::new();
    for _ in 0..10 {
        let target = memory_target(&store);
        let migrations = recording(&["1", "2", "3"], &log);
        runners.spawn(async move { run_migrations(&target, &migrations).await });
    }

    let mut applied_total = 0;
    while let Some(joined) = runners.join_next().await {
        applied_total += joined.expect("runner task").expect("runner").len();
    }

    assert_eq!(applied_total, 3);
    assert_eq!(log.snapshot(), vec!["1", "2", "3"]);
    let target = memory_target(&store);
    assert_eq!(target.done().await.expect("done"), vec!["1", "2", "3"]);
    assert!(target.dirty().await.expect("dirty").is_empty());
}

#[tokio::test]
async fn interrupted_migration_is_visible_as_dirty() {
    let store = MemoryStore::new();
    let crashed = memory_target(&store);
    crashed.create().await.expect("create");
    crashed.add("1").await.expect("add");
    crashed.start_migration("2").await.expect("start");
    // The process dies here: no finish, no unlock.

    let recovered = memory_target(&store);
    assert_eq!(recovered.dirty().await.expect("dirty"), vec!["2"]);
    assert_eq!(recovered.done().await.expect("done"), vec!["1", "2"]);

    let entry = recovered.ledger().entry("2").await.expect("read").expect("entry");
    assert!(entry.dirty);
    assert!(entry.finished_at.is_none());

    recovered.finish_migration("2").await.expect("finish");
    assert!(recovered.dirty().await.expect("dirty").is_empty());
}

#[tokio::test]
async fn done_is_sorted_whatever_the_insertion_order() {
    let store = MemoryStore::new();
    let target = memory_target(&store);
    target.create().await.expect("create");
    for id in ["2", "1", "3"] {
        target.add(id).await.expect("add");
    }
    assert_eq!(target.done().await.expect("done"), vec!["1", "2", "3"]);

    target.remove("3").await.expect("remove");
    assert_eq!(target.current().await.expect("current"), "2");
}

#[tokio::test]
async fn current_on_empty_ledger_is_a_distinct_error() {
    let target = memory_target(&MemoryStore::new());
    target.create().await.expect("create");
    let err = target.current().await.expect_err("empty ledger");
    assert!(matches!(err, MigrateError::NoCurrentMigration));
}

#[tokio::test]
async fn destroy_forgets_applied_migrations() {
    let store = MemoryStore::new();
    let target = memory_target(&store);
    let log = ExecutionLog::default();
    run_migrations(&target, &recording(&["1"], &log)).await.expect("run");

    target.destroy().await.expect("destroy");
    assert!(target.done().await.expect("done").is_empty());
}

#[tokio::test]
async fn custom_collection_keeps_ledgers_apart() {
    let store = MemoryStore::new();
    let billing = Target::new(store.clone(), fast_config().with_collection("billing_migrations")).expect("billing");
    let users = memory_target(&store);

    billing.add("1").await.expect("add");
    assert_eq!(billing.done().await.expect("done"), vec!["1"]);
    assert!(users.done().await.expect("done").is_empty());

    let guard = billing.lock().await.expect("billing lock");
    let other = users.lock().await.expect("independent lock");
    assert_ne!(guard.collection(), other.collection());
    guard.unlock().await.expect("release");
    other.unlock().await.expect("release");
}

#[tokio::test]
async fn applied_ids_resolve_back_to_runner_migrations() {
    let store = MemoryStore::new();
    let target = memory_target(&store);
    let mut source = MemorySource::new();
    for (id, description) in [("20240101_init", "create users"), ("20240202_index", "index email")] {
        source.add(Arc::new(NamedMigration::new(id, description))).expect("register");
    }

    target.add("20240101_init").await.expect("add");
    target.add("20240202_index").await.expect("add");

    let done = target.done_migrations(&source).await.expect("resolve");
    assert_eq!(done.len(), 2);
    assert_eq!(done[0].description(), "create users");
    let current = target.current_migration(&source).await.expect("current");
    assert_eq!(current.id(), "20240202_index");
    assert_eq!(source.by_id("20240101_init").expect("lookup").id(), "20240101_init");
}
