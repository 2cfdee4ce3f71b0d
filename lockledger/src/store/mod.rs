//! Document-store seam used by the ledger and the lock.
//!
//! A backend only has to offer atomic single-document operations: every state
//! transition of the ledger and of the lock is confined to one document.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::{DEFAULT_KEY_PREFIX, RedisStore};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::StoreError;

/// Field holding the primary key of every document.
pub const ID_FIELD: &str = "_id";

/// A stored document: a JSON object carrying [`ID_FIELD`].
pub type Document = Map<String, Value>;

/// Reads the primary key of a document.
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Predicate evaluated against a single field of the matched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Field is absent or explicitly null.
    IsNull { field: String },
    /// Field is present and equal to `value`.
    Equals { field: String, value: Value },
}

impl Condition {
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull { field: field.into() }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Condition::IsNull { field } => document.get(field).is_none_or(Value::is_null),
            Condition::Equals { field, value } => document.get(field) == Some(value),
        }
    }
}

/// Selects one document by primary key, optionally guarded by field conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub id: String,
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        document_id(document) == Some(self.id.as_str()) && self.conditions.iter().all(|c| c.matches(document))
    }
}

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    /// No document had the id and `upsert` created it.
    Inserted,
    /// The document matched the filter and was updated.
    Updated,
    /// Nothing matched: either the document is missing (without upsert) or one of
    /// the filter conditions did not hold.
    Unmatched,
}

/// Atomic single-document operations over named collections.
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Clone + Send + Sync {
    /// Creates an empty collection; fails with [`StoreError::CollectionExists`] when present.
    async fn create_collection(&self, collection: &str) -> Result<(), StoreError>;

    /// Removes the collection and every document in it. Missing collections are fine.
    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;

    /// Every document in ascending primary-key order.
    async fn find_sorted(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Inserts a new document; fails with [`StoreError::DuplicateKey`] if the id is taken.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// Merges `set` into the document selected by `filter`.
    ///
    /// With `upsert`, a missing document is created from the filter id and `set`. A
    /// document that exists but fails a condition is reported as
    /// [`WriteOutcome::Unmatched`], never as an error.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<WriteOutcome, StoreError>;

    /// Deletes the document with `id`; returns whether something was removed.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}
