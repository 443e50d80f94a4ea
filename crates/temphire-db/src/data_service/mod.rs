//! # Data Services
//!
//! The remote side of the entity manager: wherever entities live when they
//! are not in the cache.
//!
//! ## The Seam
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       EntityManager ↔ DataService                       │
//! │                                                                         │
//! │  EntityManager                          DataService (trait)            │
//! │  ─────────────                          ───────────────────            │
//! │  fetch_entity_by_key ──(cache miss)──►  fetch_by_key                   │
//! │  execute_query (FromServer) ─────────►  execute_query                  │
//! │  save_changes ───────────────────────►  save_changes (atomic batch)    │
//! │                                                                         │
//! │  Every read answers with a tagged outcome:                             │
//! │     Found(T)  |  NotFound  |  Failure(DbError)                         │
//! │  so "not found" is never an error the caller has to sniff out.         │
//! │                                                                         │
//! │  Implementations:                                                      │
//! │  • SqliteDataService (sqlite.rs) - local SQLite document store         │
//! │  • test doubles recording calls                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod sqlite;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use temphire_core::{EntityKey, EntityState, EntityType};

use crate::error::{DbError, DbResult};
use crate::query::EntityQuery;

pub use sqlite::SqliteDataService;

// =============================================================================
// Fetched
// =============================================================================

/// Outcome of a remote read.
#[derive(Debug)]
pub enum Fetched<T> {
    /// The data service produced a value.
    Found(T),
    /// The entity or collection does not exist remotely (404 semantics).
    NotFound,
    /// Anything else went wrong.
    Failure(DbError),
}

impl<T> Fetched<T> {
    /// Maps the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Found(value) => Fetched::Found(f(value)),
            Fetched::NotFound => Fetched::NotFound,
            Fetched::Failure(err) => Fetched::Failure(err),
        }
    }

    /// Collapses not-found into `None`, keeping failures as errors.
    pub fn into_result(self) -> DbResult<Option<T>> {
        match self {
            Fetched::Found(value) => Ok(Some(value)),
            Fetched::NotFound => Ok(None),
            Fetched::Failure(err) => Err(err),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Fetched::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Fetched::NotFound)
    }
}

impl<T> From<DbResult<T>> for Fetched<T> {
    fn from(result: DbResult<T>) -> Self {
        match result {
            Ok(value) => Fetched::Found(value),
            Err(err) => Fetched::Failure(err),
        }
    }
}

// =============================================================================
// Save Bundle
// =============================================================================

/// One pending change sent to the data service.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChange {
    pub entity_type: String,
    pub resource_name: String,
    pub key: EntityKey,
    /// Added, Modified or Deleted.
    pub state: EntityState,
    /// Current values (for Deleted: the values being deleted).
    pub values: Value,
}

/// Everything a commit persists, as one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveBundle {
    pub changes: Vec<EntityChange>,
}

impl SaveBundle {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

// =============================================================================
// Data Service
// =============================================================================

/// Remote entity source and sink.
#[async_trait]
pub trait DataService: Send + Sync + fmt::Debug {
    /// Fetches one entity by key.
    async fn fetch_by_key(&self, entity_type: &EntityType, key: &EntityKey) -> Fetched<Value>;

    /// Runs a query remotely.
    ///
    /// `entity_type` is `None` when the query's resource name maps to no
    /// registered type; implementations then address the resource by name.
    async fn execute_query(
        &self,
        query: &EntityQuery,
        entity_type: Option<&EntityType>,
    ) -> Fetched<Vec<Value>>;

    /// Persists a batch atomically: all changes or none.
    async fn save_changes(&self, bundle: &SaveBundle) -> DbResult<()>;
}
