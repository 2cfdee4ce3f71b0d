#![allow(dead_code)]

pub(crate) use lockledger::{
    MemoryStore, MigrateError, MigrateResult, Migration, MigrationTarget, Target, TargetConfig, Unlocker,
};
pub(crate) use std::sync::{Arc, Mutex};
pub(crate) use std::time::Duration;

/// Fast-polling config so contention tests finish quickly.
pub(crate) fn fast_config() -> TargetConfig {
    TargetConfig::default()
        .with_lock_timeout(Duration::from_secs(10))
        .with_poll_interval(Duration::from_millis(5))
        .with_operation_timeout(Duration::from_secs(2))
}

pub(crate) fn memory_target(store: &MemoryStore) -> Target<MemoryStore> {
    Target::new(store.clone(), fast_config()).expect("target")
}

/// Shared record of migration bodies that actually ran.
#[derive(Clone, Default)]
pub(crate) struct ExecutionLog(Arc<Mutex<Vec<String>>>);

impl ExecutionLog {
    pub(crate) fn push(&self, id: &str) {
        self.0.lock().expect("log mutex").push(id.to_string());
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.0.lock().expect("log mutex").clone()
    }
}

/// Migration whose body appends its id to an [`ExecutionLog`].
pub(crate) struct RecordingMigration {
    id: String,
    log: ExecutionLog,
}

impl RecordingMigration {
    pub(crate) fn new(id: &str, log: &ExecutionLog) -> Self {
        Self {
            id: id.to_string(),
            log: log.clone(),
        }
    }

    async fn up(&self) {
        tokio::task::yield_now().await;
        self.log.push(&self.id);
    }
}

impl Migration for RecordingMigration {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Plays the external runner: lock, skip what the ledger already has, mark dirty,
/// run, mark finished, unlock. Returns the ids applied by this call.
pub(crate) async fn run_migrations<T>(target: &T, migrations: &[RecordingMigration]) -> MigrateResult<Vec<String>>
where
    T: MigrationTarget,
{
    target.create().await?;
    let guard = target.lock().await?;
    let result = apply_pending(target, migrations).await;
    guard.unlock().await?;
    result
}

async fn apply_pending<T>(target: &T, migrations: &[RecordingMigration]) -> MigrateResult<Vec<String>>
where
    T: MigrationTarget,
{
    let done = target.done().await?;
    let mut pending: Vec<&RecordingMigration> = migrations
        .iter()
        .filter(|migration| !done.iter().any(|id| id == migration.id()))
        .collect();
    pending.sort_by(|a, b| a.id().cmp(b.id()));

    let mut applied = Vec::with_capacity(pending.len());
    for migration in pending {
        target.start_migration(migration.id()).await?;
        migration.up().await;
        target.finish_migration(migration.id()).await?;
        applied.push(migration.id().to_string());
    }
    Ok(applied)
}
