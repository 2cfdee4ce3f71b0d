//! The storage contract a migration runner drives, and its document-store
//! implementation.
//!
//! A runner is expected to call, in order: [`MigrationTarget::lock`], then
//! [`MigrationTarget::done`] to compute what is pending, then for each pending
//! migration [`MigrationTarget::start_migration`], the migration body and
//! [`MigrationTarget::finish_migration`], and finally [`Unlocker::unlock`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    config::TargetConfig,
    errors::{MigrateError, MigrateResult},
    ledger::{Ledger, LedgerEntry},
    lock::{LockGuard, Locker},
    migration::{Migration, MigrationSource},
    store::DocumentStore,
};

/// Releases a lock obtained from [`MigrationTarget::lock`].
#[allow(async_fn_in_trait)]
pub trait Unlocker {
    async fn unlock(&self) -> MigrateResult<()>;
}

impl<S> Unlocker for LockGuard<S>
where
    S: DocumentStore,
{
    async fn unlock(&self) -> MigrateResult<()> {
        LockGuard::unlock(self).await
    }
}

/// Storage operations a migration runner needs.
#[allow(async_fn_in_trait)]
pub trait MigrationTarget {
    type Unlocker: Unlocker;

    /// Creates the ledger storage; an existing one is fine.
    async fn create(&self) -> MigrateResult<()>;

    /// Drops the ledger storage.
    async fn destroy(&self) -> MigrateResult<()>;

    /// Applied migration ids in ascending order.
    async fn done(&self) -> MigrateResult<Vec<String>>;

    /// The most recent applied migration id, or [`MigrateError::NoCurrentMigration`].
    async fn current(&self) -> MigrateResult<String>;

    /// Records a migration as applied.
    async fn add(&self, id: &str) -> MigrateResult<()>;

    /// Forgets an applied migration.
    async fn remove(&self, id: &str) -> MigrateResult<()>;

    /// Marks a migration as in flight (dirty).
    async fn start_migration(&self, id: &str) -> MigrateResult<()>;

    /// Marks an in-flight migration as completed.
    async fn finish_migration(&self, id: &str) -> MigrateResult<()>;

    /// Waits for the exclusive lock.
    async fn lock(&self) -> MigrateResult<Self::Unlocker>;
}

/// Ledger and lock sharing one store handle and one naming scheme.
#[derive(Clone)]
pub struct Target<S> {
    config: TargetConfig,
    ledger: Ledger<S>,
    locker: Locker<S>,
}

impl<S> Target<S>
where
    S: DocumentStore,
{
    /// Builds a target after validating `config`.
    pub fn new(store: S, config: TargetConfig) -> MigrateResult<Self> {
        config.validate()?;
        let ledger = Ledger::new(store.clone(), config.collection.clone(), config.operation_timeout);
        let locker = Locker::new(
            store,
            config.lock_collection(),
            config.lock_timeout,
            config.poll_interval,
            config.operation_timeout,
        );
        Ok(Self { config, ledger, locker })
    }

    /// Builds a target with default settings.
    pub fn with_defaults(store: S) -> MigrateResult<Self> {
        Self::new(store, TargetConfig::default())
    }

    /// Installs the cancellation signal observed by every operation.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.ledger = self.ledger.with_cancellation(cancel.clone());
        self.locker = self.locker.with_cancellation(cancel);
        self
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn locker(&self) -> &Locker<S> {
        &self.locker
    }

    /// Full ledger records, ascending by id.
    pub async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        self.ledger.entries().await
    }

    /// Ids of migrations left dirty by an interrupted run.
    pub async fn dirty(&self) -> MigrateResult<Vec<String>> {
        self.ledger.dirty().await
    }

    /// Applied migrations resolved through `source`, ascending.
    pub async fn done_migrations(&self, source: &impl MigrationSource) -> MigrateResult<Vec<Arc<dyn Migration>>> {
        self.ledger
            .list_applied()
            .await?
            .iter()
            .map(|id| source.by_id(id))
            .collect()
    }

    /// The most recent applied migration resolved through `source`.
    pub async fn current_migration(&self, source: &impl MigrationSource) -> MigrateResult<Arc<dyn Migration>> {
        source.by_id(&self.ledger.current_applied().await?)
    }

    /// Token of the current lock holder, if any.
    pub async fn lock_holder(&self) -> MigrateResult<Option<String>> {
        self.locker.holder().await
    }

    /// Clears the lock regardless of who holds it; returns the cleared token.
    pub async fn force_unlock(&self) -> MigrateResult<Option<String>> {
        self.locker.force_release().await
    }
}

impl<S> MigrationTarget for Target<S>
where
    S: DocumentStore,
{
    type Unlocker = LockGuard<S>;

    async fn create(&self) -> MigrateResult<()> {
        self.ledger.ensure_storage_exists().await
    }

    async fn destroy(&self) -> MigrateResult<()> {
        self.ledger.destroy_storage().await
    }

    async fn done(&self) -> MigrateResult<Vec<String>> {
        self.ledger.list_applied().await
    }

    async fn current(&self) -> MigrateResult<String> {
        self.ledger.current_applied().await
    }

    async fn add(&self, id: &str) -> MigrateResult<()> {
        self.ledger.add(id).await
    }

    async fn remove(&self, id: &str) -> MigrateResult<()> {
        self.ledger.remove(id).await
    }

    async fn start_migration(&self, id: &str) -> MigrateResult<()> {
        self.ledger.mark_started(id).await
    }

    async fn finish_migration(&self, id: &str) -> MigrateResult<()> {
        self.ledger.mark_finished(id).await
    }

    async fn lock(&self) -> MigrateResult<LockGuard<S>> {
        self.locker.acquire().await
    }
}
