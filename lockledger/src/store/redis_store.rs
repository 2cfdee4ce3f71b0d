use redis::aio::ConnectionManager;
use serde_json::Value;

use super::{Document, DocumentStore, Filter, WriteOutcome, document_id};
use crate::{
    cleanup_pattern,
    errors::StoreError,
    keys::KeyContext,
    runtime::{
        commands::{build_collection_scan, build_document_delete, build_document_insert, build_document_update},
        execute_command,
    },
};

/// Key prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "lockledger";

/// Document store backed by Redis with the RedisJSON module.
///
/// Every mutation runs as one Lua script, so a document and its index entry change
/// together or not at all.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Create a store with the given connection and key prefix.
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    /// Create a store from a Redis connection URL.
    ///
    /// # Example
    /// ```ignore
    /// let store = RedisStore::connect("redis://localhost:6379", "myapp").await?;
    /// ```
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Get a clone of the connection manager for advanced operations.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    fn keys<'a>(&'a self, collection: &'a str) -> KeyContext<'a> {
        KeyContext::new(&self.prefix, collection)
    }
}

impl DocumentStore for RedisStore {
    async fn create_collection(&self, collection: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let created: Option<String> = redis::cmd("SET")
            .arg(self.keys(collection).meta())
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        match created {
            Some(_) => Ok(()),
            None => Err(StoreError::CollectionExists {
                collection: collection.to_string(),
            }),
        }
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        cleanup_pattern(&mut conn, &self.keys(collection).pattern()).await?;
        Ok(())
    }

    async fn find_sorted(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut conn = self.conn.clone();
        let reply = execute_command(&mut conn, &build_collection_scan(&self.keys(collection))).await?;
        match reply.get("documents") {
            Some(Value::Array(documents)) => documents
                .iter()
                .map(|doc| match doc {
                    Value::Object(map) => Ok(map.clone()),
                    other => Err(StoreError::backend(format!("unexpected document in '{collection}': {other}"))),
                })
                .collect(),
            _ => Err(StoreError::backend("scan reply without documents")),
        }
    }

    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(self.keys(collection).document(id))
            .query_async(&mut conn)
            .await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let id = document_id(&document)
            .ok_or_else(|| StoreError::backend(format!("document without _id in '{collection}'")))?
            .to_string();
        let payload = serde_json::to_string(&document)?;
        let mut conn = self.conn.clone();
        execute_command(&mut conn, &build_document_insert(&self.keys(collection), &id, payload)).await?;
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        set: Document,
        upsert: bool,
    ) -> Result<WriteOutcome, StoreError> {
        let mut conn = self.conn.clone();
        let command = build_document_update(&self.keys(collection), filter, set, upsert);
        let reply = execute_command(&mut conn, &command).await?;
        let outcome = reply
            .get("outcome")
            .cloned()
            .ok_or_else(|| StoreError::backend("update reply without outcome"))?;
        Ok(serde_json::from_value(outcome)?)
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply = execute_command(&mut conn, &build_document_delete(&self.keys(collection), id)).await?;
        Ok(reply.get("deleted").and_then(Value::as_u64).unwrap_or(0) > 0)
    }
}
