//! Polling mutual-exclusion lock built on one well-known document.
//!
//! The lock collection holds a single document `{_id: "lock", lock_id}`. A null or
//! absent `lock_id` means free. Acquiring is a conditional upsert that only matches
//! while `lock_id` is null; the store applies it atomically, so of several racing
//! callers at most one sees its token written. Losers sleep for the poll interval
//! and try again until the acquisition window closes. Waiters are not queued.

use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{MigrateError, MigrateResult, StoreError},
    id::generate_lock_token,
    ops::bounded,
    store::{Condition, Document, DocumentStore, Filter, WriteOutcome},
};

/// Primary key of the lock document.
pub const LOCK_DOCUMENT_ID: &str = "lock";
/// Field carrying the holder token.
pub const LOCK_ID_FIELD: &str = "lock_id";

/// Acquires the lock stored in one collection.
#[derive(Clone)]
pub struct Locker<S> {
    store: S,
    collection: String,
    lock_timeout: Duration,
    poll_interval: Duration,
    operation_timeout: Duration,
    cancel: CancellationToken,
}

impl<S> Locker<S>
where
    S: DocumentStore,
{
    pub fn new(
        store: S,
        collection: impl Into<String>,
        lock_timeout: Duration,
        poll_interval: Duration,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            lock_timeout,
            poll_interval,
            operation_timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Blocks until the lock is held by a fresh token, the lock timeout elapses or
    /// the cancellation signal fires.
    pub async fn acquire(&self) -> MigrateResult<LockGuard<S>> {
        let token = generate_lock_token();
        let started = Instant::now();
        let deadline = started + self.lock_timeout;
        let filter = Filter::by_id(LOCK_DOCUMENT_ID).with(Condition::is_null(LOCK_ID_FIELD));
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let attempt = bounded("lock", self.operation_timeout, &self.cancel, async {
                self.store
                    .update_one(&self.collection, &filter, lock_fields(Value::from(token.as_str())), true)
                    .await
                    .map_err(|err| MigrateError::store("lock", None, err))
            });

            let outcome = tokio::select! {
                result = attempt => result,
                _ = sleep_until(deadline) => Err(MigrateError::LockTimeout { waited: started.elapsed() }),
            };

            match outcome {
                Ok(WriteOutcome::Inserted | WriteOutcome::Updated) => {
                    log::debug!(
                        "lock acquired in {} after {attempts} attempt(s) ({:?})",
                        self.collection,
                        started.elapsed()
                    );
                    return Ok(self.guard(token));
                }
                // A racing upsert that created the document first is contention too.
                Ok(WriteOutcome::Unmatched)
                | Err(MigrateError::Store {
                    source: StoreError::DuplicateKey { .. },
                    ..
                }) => {
                    log::debug!("lock in {} is held elsewhere; retrying", self.collection);
                }
                Err(err) => {
                    // The abandoned attempt may still have landed on the server.
                    if matches!(
                        err,
                        MigrateError::Cancelled | MigrateError::LockTimeout { .. } | MigrateError::OperationTimeout { .. }
                    ) {
                        self.guard(token).release_quietly().await;
                    }
                    return Err(err);
                }
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(MigrateError::Cancelled),
                _ = sleep_until(deadline) => {
                    return Err(MigrateError::LockTimeout { waited: started.elapsed() });
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    /// Token of the current holder, if any.
    pub async fn holder(&self) -> MigrateResult<Option<String>> {
        const OP: &str = "read lock";
        bounded(OP, self.operation_timeout, &self.cancel, async {
            let document = self
                .store
                .find_one(&self.collection, LOCK_DOCUMENT_ID)
                .await
                .map_err(|err| MigrateError::store(OP, None, err))?;
            Ok(document
                .and_then(|doc| doc.get(LOCK_ID_FIELD).and_then(Value::as_str).map(str::to_string)))
        })
        .await
    }

    /// Clears the lock whoever holds it and returns the token that was cleared.
    /// Meant for operators recovering from a crashed holder.
    pub async fn force_release(&self) -> MigrateResult<Option<String>> {
        const OP: &str = "force unlock";
        let previous = self.holder().await?;
        bounded(OP, self.operation_timeout, &self.cancel, async {
            self.store
                .update_one(&self.collection, &Filter::by_id(LOCK_DOCUMENT_ID), lock_fields(Value::Null), false)
                .await
                .map_err(|err| MigrateError::store(OP, None, err))
        })
        .await?;
        if let Some(token) = &previous {
            log::debug!("lock in {} forcibly released from {token}", self.collection);
        }
        Ok(previous)
    }

    fn guard(&self, token: String) -> LockGuard<S> {
        LockGuard {
            store: self.store.clone(),
            collection: self.collection.clone(),
            token,
            operation_timeout: self.operation_timeout,
        }
    }
}

fn lock_fields(lock_id: Value) -> Document {
    let mut set = Document::new();
    set.insert(LOCK_ID_FIELD.into(), lock_id);
    set
}

/// Proof of holding the lock; the only way to release it.
///
/// Dropping the guard does not release the lock: call [`LockGuard::unlock`].
pub struct LockGuard<S> {
    store: S,
    collection: String,
    token: String,
    operation_timeout: Duration,
}

impl<S> LockGuard<S>
where
    S: DocumentStore,
{
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Releases the lock if this guard's token still holds it.
    ///
    /// Releasing a lock that is already free, or that another token holds, succeeds
    /// without touching it, so calling this more than once is fine. Release ignores
    /// the cancellation signal: a cancelled run still frees the lock.
    pub async fn unlock(&self) -> MigrateResult<()> {
        const OP: &str = "unlock";
        let never = CancellationToken::new();
        let outcome = bounded(OP, self.operation_timeout, &never, async {
            self.store
                .update_one(
                    &self.collection,
                    &Filter::by_id(LOCK_DOCUMENT_ID).with(Condition::equals(LOCK_ID_FIELD, self.token.as_str())),
                    lock_fields(Value::Null),
                    false,
                )
                .await
                .map_err(|err| MigrateError::store(OP, None, err))
        })
        .await?;

        match outcome {
            WriteOutcome::Updated => log::debug!("lock released in {}", self.collection),
            _ => log::debug!("lock in {} was not held by {}; nothing to release", self.collection, self.token),
        }
        Ok(())
    }

    async fn release_quietly(&self) {
        if let Err(err) = self.unlock().await {
            log::debug!("best-effort release in {} failed: {err}", self.collection);
        }
    }
}
