use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{MigrateError, MigrateResult};

/// Default collection name used to store the ledger.
pub const DEFAULT_COLLECTION: &str = "_migrations";
/// Suffix appended to the ledger collection to name the lock collection.
pub const LOCK_COLLECTION_SUFFIX: &str = "_lock";
/// Default time allowed for acquiring the lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
/// Default time allowed for a single ledger or lock round-trip.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);
/// Default wait between two contended lock attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Key separator and `SCAN MATCH` glob metacharacters.
const FORBIDDEN_COLLECTION_CHARS: &[char] = &[':', '*', '?', '[', ']', '\\'];

/// Settings of a [`Target`](crate::Target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Ledger collection; the lock lives in `<collection>_lock`.
    pub collection: String,
    /// Overall window for one lock acquisition, across every poll.
    pub lock_timeout: Duration,
    /// Time limit for each individual store round-trip.
    pub operation_timeout: Duration,
    /// Wait between two attempts while the lock is held elsewhere.
    pub poll_interval: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TargetConfig {
    /// Sets the ledger collection. An empty name keeps the current one.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        if !collection.is_empty() {
            self.collection = collection;
        }
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Name of the lock collection, always derived from the ledger collection.
    pub fn lock_collection(&self) -> String {
        format!("{}{LOCK_COLLECTION_SUFFIX}", self.collection)
    }

    pub fn validate(&self) -> MigrateResult<()> {
        if self.collection.is_empty() {
            return Err(MigrateError::config("collection name must not be empty"));
        }
        let forbidden = |c: &char| FORBIDDEN_COLLECTION_CHARS.contains(c) || c.is_whitespace();
        if let Some(bad) = self.collection.chars().find(forbidden) {
            return Err(MigrateError::config(format!(
                "collection name '{}' must not contain {bad:?}",
                self.collection
            )));
        }
        if self.lock_timeout.is_zero() {
            return Err(MigrateError::config("lock timeout must be greater than zero"));
        }
        if self.operation_timeout.is_zero() {
            return Err(MigrateError::config("operation timeout must be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(MigrateError::config("poll interval must be greater than zero"));
        }
        Ok(())
    }
}
