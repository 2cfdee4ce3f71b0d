use std::{borrow::Cow, time::Duration};

use thiserror::Error;

/// Failure reported by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create_collection` was called for a collection that is already present.
    #[error("collection '{collection}' already exists")]
    CollectionExists { collection: String },

    /// An insert collided with an existing primary key.
    #[error("duplicate key '{id}' in collection '{collection}'")]
    DuplicateKey { collection: String, id: String },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A document or script payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A Lua script replied with an error code the client does not know.
    #[error("script error: {code}")]
    Script { code: String },

    /// Any other backend-specific failure.
    #[error("{message}")]
    Backend { message: Cow<'static, str> },
}

impl StoreError {
    pub fn backend(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Backend { message: message.into() }
    }
}

/// Top-level error type returned by the ledger, the lock and the target.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Invalid construction arguments.
    #[error("invalid configuration: {message}")]
    Config { message: Cow<'static, str> },

    /// The lock could not be acquired before the acquisition window closed.
    #[error("timeout while trying to lock the database (waited {waited:?})")]
    LockTimeout { waited: Duration },

    /// The caller's cancellation signal fired while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// A single store round-trip exceeded the per-operation timeout.
    #[error("{operation} timed out after {timeout:?}")]
    OperationTimeout { operation: &'static str, timeout: Duration },

    /// The ledger is empty.
    #[error("no current migration")]
    NoCurrentMigration,

    /// A ledger entry required by the operation does not exist.
    #[error("migration '{id}' not found in the ledger")]
    NotFound { id: String },

    /// A stored identifier has no counterpart in the migration source.
    #[error("migration '{id}' is not known to the migration source")]
    UnknownMigration { id: String },

    /// The store failed while running a ledger or lock operation.
    #[error("{operation} failed{}: {source}", for_id(.id))]
    Store {
        operation: &'static str,
        id: Option<String>,
        #[source]
        source: StoreError,
    },
}

impl MigrateError {
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config { message: message.into() }
    }

    pub(crate) fn store(operation: &'static str, id: Option<&str>, source: StoreError) -> Self {
        Self::Store {
            operation,
            id: id.map(str::to_string),
            source,
        }
    }

    /// True when the lock acquisition window elapsed.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// True when the external cancellation signal ended the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn for_id(id: &Option<String>) -> String {
    id.as_deref().map(|id| format!(" for '{id}'")).unwrap_or_default()
}

pub type MigrateResult<T> = Result<T, MigrateError>;
