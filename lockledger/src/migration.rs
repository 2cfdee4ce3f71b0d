//! Minimal view of the runner's migration objects.
//!
//! The ledger only stores identifiers. Runners that want their own migration
//! objects back resolve those identifiers through a [`MigrationSource`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::errors::{MigrateError, MigrateResult};

/// Anything the runner treats as a migration. Only the identifier is persisted.
pub trait Migration: Send + Sync {
    /// Stable identifier; sorts in application order (e.g. timestamp-prefixed).
    fn id(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("id", &self.id())
            .field("description", &self.description())
            .finish()
    }
}

/// Looks migrations up by identifier.
pub trait MigrationSource {
    fn by_id(&self, id: &str) -> MigrateResult<Arc<dyn Migration>>;
}

/// A migration known only by id and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedMigration {
    id: String,
    description: String,
}

impl NamedMigration {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

impl Migration for NamedMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// In-memory source keyed by migration id.
#[derive(Default, Clone)]
pub struct MemorySource {
    migrations: BTreeMap<String, Arc<dyn Migration>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration; ids must be unique.
    pub fn add(&mut self, migration: Arc<dyn Migration>) -> MigrateResult<()> {
        let id = migration.id().to_string();
        if self.migrations.contains_key(&id) {
            return Err(MigrateError::config(format!("migration '{id}' registered twice")));
        }
        self.migrations.insert(id, migration);
        Ok(())
    }

    /// Every registered migration in ascending id order.
    pub fn list(&self) -> Vec<Arc<dyn Migration>> {
        self.migrations.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl MigrationSource for MemorySource {
    fn by_id(&self, id: &str) -> MigrateResult<Arc<dyn Migration>> {
        self.migrations
            .get(id)
            .cloned()
            .ok_or_else(|| MigrateError::UnknownMigration { id: id.to_string() })
    }
}
