//! Recording in-memory data service for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use temphire_core::{EntityKey, EntityState, EntityType};

use super::{DataService, Fetched, SaveBundle};
use crate::error::{DbError, DbResult};
use crate::query::EntityQuery;

/// A call received by [`MockDataService`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    FetchByKey { entity_type: String, key: String },
    ExecuteQuery { resource: String, entity_type: Option<String> },
    SaveChanges { changes: usize },
}

/// Serves entities from memory and records every call.
///
/// Queries against a resource with no entity type, or one removed with
/// [`remove_resource`](Self::remove_resource), answer `NotFound` the way a
/// server answers for a collection it does not know.
#[derive(Debug, Default)]
pub(crate) struct MockDataService {
    entities: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<Call>>,
    missing_resources: Mutex<Vec<String>>,
    read_failure: Mutex<Option<u16>>,
    fail_saves: AtomicBool,
}

impl MockDataService {
    pub(crate) fn new() -> Self {
        MockDataService::default()
    }

    pub(crate) fn with_entities(self, entity_type: &str, values: Vec<Value>) -> Self {
        self.entities
            .lock()
            .entry(entity_type.to_string())
            .or_default()
            .extend(values);
        self
    }

    pub(crate) fn remove_resource(&self, resource: &str) {
        self.missing_resources.lock().push(resource.to_string());
    }

    /// Every read answers with a remote failure of `status`.
    pub(crate) fn fail_reads(&self, status: u16) {
        *self.read_failure.lock() = Some(status);
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn query_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::ExecuteQuery { .. }))
            .count()
    }

    pub(crate) fn stored(&self, entity_type: &str) -> Vec<Value> {
        self.entities
            .lock()
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn scripted_failure(&self) -> Option<DbError> {
        self.read_failure
            .lock()
            .map(|status| DbError::remote(status, "scripted failure"))
    }
}

#[async_trait]
impl DataService for MockDataService {
    async fn fetch_by_key(&self, entity_type: &EntityType, key: &EntityKey) -> Fetched<Value> {
        self.record(Call::FetchByKey {
            entity_type: entity_type.name.clone(),
            key: key.to_string(),
        });
        if let Some(err) = self.scripted_failure() {
            return Fetched::Failure(err);
        }

        self.stored(&entity_type.name)
            .into_iter()
            .find(|value| entity_type.key_of(value).as_ref() == Some(key))
            .map_or(Fetched::NotFound, Fetched::Found)
    }

    async fn execute_query(
        &self,
        query: &EntityQuery,
        entity_type: Option<&EntityType>,
    ) -> Fetched<Vec<Value>> {
        self.record(Call::ExecuteQuery {
            resource: query.resource_name().to_string(),
            entity_type: entity_type.map(|t| t.name.clone()),
        });
        if let Some(err) = self.scripted_failure() {
            return Fetched::Failure(err);
        }

        let missing = self
            .missing_resources
            .lock()
            .iter()
            .any(|resource| resource == query.resource_name());

        match entity_type {
            Some(_) if missing => Fetched::NotFound,
            Some(entity_type) => Fetched::Found(
                self.stored(&entity_type.name)
                    .into_iter()
                    .filter(|value| query.predicate().matches(value))
                    .collect(),
            ),
            None => Fetched::NotFound,
        }
    }

    async fn save_changes(&self, bundle: &SaveBundle) -> DbResult<()> {
        self.record(Call::SaveChanges {
            changes: bundle.len(),
        });
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DbError::remote(500, "save rejected"));
        }

        let mut entities = self.entities.lock();
        for change in &bundle.changes {
            let stored = entities.entry(change.entity_type.clone()).or_default();
            stored.retain(|value| {
                EntityKey::from_value(value.get("id").unwrap_or(&Value::Null)).as_ref() != Some(&change.key)
            });
            if change.state != EntityState::Deleted {
                stored.push(change.values.clone());
            }
        }
        Ok(())
    }
}
