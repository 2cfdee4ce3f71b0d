use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;

use super::{Document, DocumentStore, Filter, ID_FIELD, WriteOutcome, document_id};
use crate::errors::StoreError;

type Collection = BTreeMap<String, Document>;

/// In-process document store.
///
/// Collections are ordered maps keyed by primary key, so `find_sorted` is a plain
/// iteration. Each read-modify-write runs under the store mutex. Clones share the
/// same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<BTreeMap<String, Collection>>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every operation by `latency` to simulate a network round-trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn create_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.round_trip().await;
        let mut collections = self.collections.lock().await;
        if collections.contains_key(collection) {
            return Err(StoreError::CollectionExists {
                collection: collection.to_string(),
            });
        }
        collections.insert(collection.to_string(), Collection::new());
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.round_trip().await;
        self.collections.lock().await.remove(collection);
        Ok(())
    }

    async fn find_sorted(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.round_trip().await;
        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.round_trip().await;
        let collections = self.collections.lock().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.round_trip().await;
        let id = document_id(&document)
            .ok_or_else(|| StoreError::backend(format!("document without {ID_FIELD} in '{collection}'")))?
            .to_string();
        let mut collections = self.collections.lock().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                id,
            });
        }
        docs.insert(id, document);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<WriteOutcome, StoreError> {
        self.round_trip().await;
        let mut collections = self.collections.lock().await;
        let docs = if upsert {
            collections.entry(collection.to_string()).or_default()
        } else {
            match collections.get_mut(collection) {
                Some(docs) => docs,
                None => return Ok(WriteOutcome::Unmatched),
            }
        };
        match docs.get_mut(&filter.id) {
            Some(existing) if filter.matches(existing) => {
                existing.extend(set);
                Ok(WriteOutcome::Updated)
            }
            Some(_) => Ok(WriteOutcome::Unmatched),
            None if upsert => {
                let mut document = set;
                document.insert(ID_FIELD.to_string(), filter.id.clone().into());
                docs.insert(filter.id.clone(), document);
                Ok(WriteOutcome::Inserted)
            }
            None => Ok(WriteOutcome::Unmatched),
        }
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.round_trip().await;
        let mut collections = self.collections.lock().await;
        Ok(collections
            .get_mut(collection)
            .is_some_and(|docs| docs.remove(id).is_some()))
    }
}
