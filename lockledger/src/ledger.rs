//! Durable record of applied migrations.
//!
//! One document per migration: `{_id, dirty, started_at, finished_at}`. An entry is
//! written with `dirty = true` right before the migration body runs and flipped to
//! `false` once it completed, so an entry still dirty on the next run marks an
//! interrupted migration. Reacting to that is left to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{MigrateError, MigrateResult, StoreError},
    ops::bounded,
    store::{Document, DocumentStore, Filter, WriteOutcome},
};

/// One ledger document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "_id")]
    pub id: String,
    /// Entries written by the simpler `{_id}` layout decode as clean.
    #[serde(default)]
    pub dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    fn from_document(document: Document) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(Value::Object(document))?)
    }

    fn into_document(self) -> Result<Document, StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(document) => Ok(document),
            _ => Err(StoreError::backend("ledger entry did not serialize to an object")),
        }
    }
}

/// Ledger operations over one collection of a [`DocumentStore`].
#[derive(Clone)]
pub struct Ledger<S> {
    store: S,
    collection: String,
    operation_timeout: Duration,
    cancel: CancellationToken,
}

impl<S> Ledger<S>
where
    S: DocumentStore,
{
    pub fn new(store: S, collection: impl Into<String>, operation_timeout: Duration) -> Self {
        Self {
            store,
            collection: collection.into(),
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

    /// Creates the ledger collection; an existing collection is fine.
    pub async fn ensure_storage_exists(&self) -> MigrateResult<()> {
        const OP: &str = "create ledger collection";
        bounded(OP, self.operation_timeout, &self.cancel, async {
            match self.store.create_collection(&self.collection).await {
                Ok(()) | Err(StoreError::CollectionExists { .. }) => Ok(()),
                Err(err) => Err(MigrateError::store(OP, None, err)),
            }
        })
        .await
    }

    /// Drops the ledger collection with every entry in it.
    pub async fn destroy_storage(&self) -> MigrateResult<()> {
        const OP: &str = "drop ledger collection";
        bounded(OP, self.operation_timeout, &self.cancel, async {
            self.store
                .drop_collection(&self.collection)
                .await
                .map_err(|err| MigrateError::store(OP, None, err))
        })
        .await
    }

    /// Every entry, ascending by migration id.
    pub async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        const OP: &str = "list applied migrations";
        bounded(OP, self.operation_timeout, &self.cancel, async {
            self.store
                .find_sorted(&self.collection)
                .await
                .and_then(|documents| documents.into_iter().map(LedgerEntry::from_document).collect())
                .map_err(|err| MigrateError::store(OP, None, err))
        })
        .await
    }

    /// Applied migration ids, ascending.
    pub async fn list_applied(&self) -> MigrateResult<Vec<String>> {
        Ok(self.entries().await?.into_iter().map(|entry| entry.id).collect())
    }

    /// The most recent applied migration id.
    pub async fn current_applied(&self) -> MigrateResult<String> {
        self.list_applied()
            .await?
            .pop()
            .ok_or(MigrateError::NoCurrentMigration)
    }

    /// Ids of entries left dirty by an interrupted run.
    pub async fn dirty(&self) -> MigrateResult<Vec<String>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| entry.dirty)
            .map(|entry| entry.id)
            .collect())
    }

    pub async fn entry(&self, id: &str) -> MigrateResult<Option<LedgerEntry>> {
        const OP: &str = "read migration";
        bounded(OP, self.operation_timeout, &self.cancel, async {
            match self.store.find_one(&self.collection, id).await {
                Ok(Some(document)) => LedgerEntry::from_document(document)
                    .map(Some)
                    .map_err(|err| MigrateError::store(OP, Some(id), err)),
                Ok(None) => Ok(None),
                Err(err) => Err(MigrateError::store(OP, Some(id), err)),
            }
        })
        .await
    }

    /// Records `id` as applied without going through the dirty state.
    pub async fn add(&self, id: &str) -> MigrateResult<()> {
        const OP: &str = "add migration";
        let now = Utc::now();
        let entry = LedgerEntry {
            id: id.to_string(),
            dirty: false,
            started_at: Some(now),
            finished_at: Some(now),
        };
        bounded(OP, self.operation_timeout, &self.cancel, async {
            let document = entry.into_document().map_err(|err| MigrateError::store(OP, Some(id), err))?;
            self.store
                .insert_one(&self.collection, document)
                .await
                .map_err(|err| MigrateError::store(OP, Some(id), err))
        })
        .await
    }

    /// Marks `id` as in flight. Calling it again for an entry that is already dirty
    /// succeeds.
    pub async fn mark_started(&self, id: &str) -> MigrateResult<()> {
        const OP: &str = "start migration";
        let mut set = Document::new();
        set.insert("dirty".into(), Value::Bool(true));
        set.insert("started_at".into(), Value::from(Utc::now().to_rfc3339()));
        set.insert("finished_at".into(), Value::Null);

        bounded(OP, self.operation_timeout, &self.cancel, async {
            self.store
                .update_one(&self.collection, &Filter::by_id(id), set, true)
                .await
                .map_err(|err| MigrateError::store(OP, Some(id), err))
        })
        .await?;
        log::debug!("migration {id} marked dirty in {}", self.collection);
        Ok(())
    }

    /// Clears the dirty flag of an existing entry.
    pub async fn mark_finished(&self, id: &str) -> MigrateResult<()> {
        const OP: &str = "finish migration";
        let mut set = Document::new();
        set.insert("dirty".into(), Value::Bool(false));
        set.insert("finished_at".into(), Value::from(Utc::now().to_rfc3339()));

        let outcome = bounded(OP, self.operation_timeout, &self.cancel, async {
            self.store
                .update_one(&self.collection, &Filter::by_id(id), set, false)
                .await
                .map_err(|err| MigrateError::store(OP, Some(id), err))
        })
        .await?;

        match outcome {
            WriteOutcome::Unmatched => Err(MigrateError::NotFound { id: id.to_string() }),
            WriteOutcome::Updated | WriteOutcome::Inserted => {
                log::debug!("migration {id} marked finished in {}", self.collection);
                Ok(())
            }
        }
    }

    /// Deletes the entry for `id`; a missing entry is not an error.
    pub async fn remove(&self, id: &str) -> MigrateResult<()> {
        const OP: &str = "remove migration";
        bounded(OP, self.operation_timeout, &self.cancel, async {
            self.store
                .delete_one(&self.collection, id)
                .await
                .map(drop)
                .map_err(|err| MigrateError::store(OP, Some(id), err))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new(), "_migrations", Duration::from_secs(1))
    }

    #[test]
    fn simple_layout_decodes_as_clean() {
        let document = json!({"_id": "1"}).as_object().cloned().expect("object");
        let entry = LedgerEntry::from_document(document).expect("decode");
        assert_eq!(entry.id, "1");
        assert!(!entry.dirty);
        assert!(entry.started_at.is_none());
    }

    #[tokio::test]
    async fn ensure_storage_exists_is_idempotent() {
        let ledger = ledger();
        ledger.ensure_storage_exists().await.expect("first");
        ledger.ensure_storage_exists().await.expect("second");
    }

    #[tokio::test]
    async fn list_applied_is_sorted_regardless_of_insertion_order() {
        let ledger = ledger();
        ledger.ensure_storage_exists().await.expect("create");
        for id in ["2", "1", "3"] {
            ledger.add(id).await.expect("add");
        }
        assert_eq!(ledger.list_applied().await.expect("list"), vec!["1", "2", "3"]);
        assert_eq!(ledger.current_applied().await.expect("current"), "3");
    }

    #[tokio::test]
    async fn current_on_empty_ledger_reports_no_current_migration() {
        let ledger = ledger();
        ledger.ensure_storage_exists().await.expect("create");
        let err = ledger.current_applied().await.expect_err("empty");
        assert!(matches!(err, MigrateError::NoCurrentMigration));
    }

    #[tokio::test]
    async fn started_entry_stays_dirty_until_finished() {
        let ledger = ledger();
        ledger.mark_started("m").await.expect("start");

        let entry = ledger.entry("m").await.expect("read").expect("present");
        assert!(entry.dirty);
        assert!(entry.started_at.is_some());
        assert!(entry.finished_at.is_none());
        assert_eq!(ledger.dirty().await.expect("dirty"), vec!["m"]);

        ledger.mark_started("m").await.expect("restart is idempotent");
        ledger.mark_finished("m").await.expect("finish");

        let entry = ledger.entry("m").await.expect("read").expect("present");
        assert!(!entry.dirty);
        assert!(entry.finished_at.is_some());
        assert!(ledger.dirty().await.expect("dirty").is_empty());
    }

    #[tokio::test]
    async fn finishing_an_unknown_migration_fails() {
        let ledger = ledger();
        let err = ledger.mark_finished("ghost").await.expect_err("missing entry");
        assert!(matches!(err, MigrateError::NotFound { ref id } if id == "ghost"));
    }

    #[tokio::test]
    async fn adding_twice_is_a_store_error() {
        let ledger = ledger();
        ledger.add("1").await.expect("add");
        let err = ledger.add("1").await.expect_err("duplicate");
        assert!(matches!(
            err,
            MigrateError::Store {
                operation: "add migration",
                source: StoreError::DuplicateKey { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn remove_deletes_and_tolerates_missing_entries() {
        let ledger = ledger();
        ledger.add("1").await.expect("add");
        ledger.remove("1").await.expect("remove");
        ledger.remove("1").await.expect("remove again");
        assert!(ledger.list_applied().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn destroy_storage_drops_entries() {
        let ledger = ledger();
        ledger.ensure_storage_exists().await.expect("create");
        ledger.add("1").await.expect("add");
        ledger.destroy_storage().await.expect("destroy");
        assert!(ledger.list_applied().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn slow_store_hits_operation_timeout() {
        let store = MemoryStore::new().with_latency(Duration::from_millis(200));
        let ledger = Ledger::new(store, "_migrations", Duration::from_millis(20));
        let err = ledger.list_applied().await.expect_err("timeout");
        assert!(matches!(err, MigrateError::OperationTimeout { .. }));
    }

    #[tokio::test]
    async fn cancelled_ledger_refuses_work() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ledger = ledger().with_cancellation(cancel);
        let err = ledger.mark_started("m").await.expect_err("cancelled");
        assert!(err.is_cancelled());
    }
}
