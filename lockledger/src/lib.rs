//! Lockledger core library.
//!
//! Storage backend for a pluggable migration runner: a crash-aware ledger of applied
//! migrations and a polling distributed lock, both built only from atomic
//! single-document operations of a document store.
//!
//! # Example
//! ```ignore
//! let store = RedisStore::connect("redis://localhost:6379", "myapp").await?;
//! let target = Target::new(store, TargetConfig::default())?;
//!
//! target.create().await?;
//! let guard = target.lock().await?;
//! for id in pending(&target.done().await?) {
//!     target.start_migration(&id).await?;
//!     run(&id).await?;
//!     target.finish_migration(&id).await?;
//! }
//! guard.unlock().await?;
//! ```

pub mod config;
pub mod errors;
pub mod id;
pub mod keys;
pub mod ledger;
pub mod lock;
pub mod migration;
mod ops;
pub mod runtime;
pub mod store;
pub mod target;

pub use config::TargetConfig;
pub use errors::*;
pub use ledger::{Ledger, LedgerEntry};
pub use lock::{LockGuard, Locker};
pub use migration::{MemorySource, Migration, MigrationSource, NamedMigration};
pub use store::{DocumentStore, MemoryStore, RedisStore};
pub use target::{MigrationTarget, Target, Unlocker};

// Re-export redis types so users don't need to depend on a specific redis version
pub use redis;
pub use redis::aio::ConnectionManager;
pub use tokio_util::sync::CancellationToken;

/// Delete all keys matching a pattern.
///
/// This performs a SCAN + DEL operation to safely delete keys without blocking Redis.
pub async fn cleanup_pattern(conn: &mut ConnectionManager, pattern: &str) -> Result<u64, StoreError> {
    const SCAN_COUNT: usize = 1000;
    let mut cursor: u64 = 0;
    let mut total_deleted: u64 = 0;

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;

        if !keys.is_empty() {
            let deleted: u64 = redis::cmd("DEL").arg(&keys).query_async(conn).await?;
            total_deleted += deleted;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    Ok(total_deleted)
}
