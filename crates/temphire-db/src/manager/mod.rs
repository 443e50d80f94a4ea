//! # Entity Manager
//!
//! Change-tracking cache between repositories and a [`DataService`].
//!
//! ## Query Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         EntityManager                                   │
//! │                                                                         │
//! │  fetch_entity_by_key(type, key, check_local_cache_first)               │
//! │       │                                                                 │
//! │       ├── cache hit (not deleted) ───────────────► Found(value)        │
//! │       └── miss ──► DataService.fetch_by_key ──► merge ──► Fetched      │
//! │                                                                         │
//! │  execute_query(query)                                                   │
//! │       │                                                                 │
//! │       ├── FromLocalCache ──► execute_query_locally (no I/O)            │
//! │       └── FromServer ─────► DataService.execute_query ──► merge        │
//! │                                                                         │
//! │  Merging preserves pending local changes: a Modified entity keeps      │
//! │  its edits, a Deleted one stays out of results.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! The cache sits behind a `parking_lot::RwLock`. Guards are always dropped
//! before a data service call is awaited; `save_changes` snapshots the
//! pending set, saves it, then re-acquires the lock to promote entries.

mod cache;
mod provider;

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde_json::Value;
use temphire_core::{Entity, EntityKey, EntityState, EntityType, FetchStrategy, MetadataStore};
use tracing::{debug, info, warn};

use crate::data_service::{DataService, EntityChange, Fetched, SaveBundle};
use crate::error::{DbError, DbResult};
use crate::query::EntityQuery;

pub use cache::{EntityCache, TrackedEntity};
pub use provider::{EntityManagerProvider, DEFAULT_LOOKUP_TYPES};

/// Tracks entities for one editing session.
#[derive(Debug)]
pub struct EntityManager {
    metadata: Arc<MetadataStore>,
    data_service: Arc<dyn DataService>,
    cache: RwLock<EntityCache>,
}

impl EntityManager {
    /// Creates a manager with an empty cache.
    pub fn new(metadata: Arc<MetadataStore>, data_service: Arc<dyn DataService>) -> Self {
        EntityManager {
            metadata,
            data_service,
            cache: RwLock::new(EntityCache::new()),
        }
    }

    /// The metadata registry shared with every manager of the same provider.
    pub fn metadata_store(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn data_service(&self) -> &Arc<dyn DataService> {
        &self.data_service
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, EntityCache> {
        self.cache.read()
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, EntityCache> {
        self.cache.write()
    }

    fn resolve_type(&self, type_name: &str) -> DbResult<EntityType> {
        self.metadata
            .get_entity_type(type_name, false)
            .ok_or_else(|| DbError::UnknownEntityType(type_name.to_string()))
    }

    /// Resolves the type and reads the key out of `values`.
    fn identify(&self, type_name: &str, values: &Value) -> DbResult<(EntityType, EntityKey)> {
        let entity_type = self.resolve_type(type_name)?;
        let key = entity_type.key_of(values).ok_or_else(|| {
            DbError::invalid_state(
                type_name,
                "?",
                format!("missing key property '{}'", entity_type.key_property),
            )
        })?;
        Ok((entity_type, key))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetches one entity by key.
    ///
    /// With `check_local_cache_first`, a tracked entity that is not marked
    /// deleted is returned without calling the data service. A remote
    /// result is merged into the cache; if the merged entity is pending
    /// deletion the outcome is `NotFound`.
    pub async fn fetch_entity_by_key(
        &self,
        type_name: &str,
        key: &EntityKey,
        check_local_cache_first: bool,
    ) -> Fetched<Value> {
        let entity_type = match self.resolve_type(type_name) {
            Ok(entity_type) => entity_type,
            Err(err) => return Fetched::Failure(err),
        };

        if check_local_cache_first {
            let cached = {
                let cache = self.read_cache();
                cache
                    .get(type_name, key)
                    .filter(|tracked| !tracked.state.is_deleted())
                    .map(|tracked| tracked.current.clone())
            };
            if let Some(value) = cached {
                debug!(entity_type = type_name, key = %key, "Entity served from cache");
                return Fetched::Found(value);
            }
        }

        debug!(entity_type = type_name, key = %key, "Fetching entity from data service");
        match self.data_service.fetch_by_key(&entity_type, key).await {
            Fetched::Found(remote) => {
                let remote_key = entity_type.key_of(&remote).unwrap_or_else(|| key.clone());
                let mut cache = self.write_cache();
                let tracked = cache.merge_remote(type_name, remote_key, remote);
                if tracked.state.is_deleted() {
                    Fetched::NotFound
                } else {
                    Fetched::Found(tracked.current.clone())
                }
            }
            other => other,
        }
    }

    /// Executes a query under its fetch strategy (default: from server).
    ///
    /// Remote results whose resource resolves to an entity type are merged
    /// into the cache; results for unmapped resources are returned as-is.
    pub async fn execute_query(&self, query: &EntityQuery) -> Fetched<Vec<Value>> {
        let strategy = query.fetch_strategy().unwrap_or(FetchStrategy::FromServer);
        debug!(
            resource = query.resource_name(),
            strategy = %strategy,
            "Executing query"
        );

        if strategy == FetchStrategy::FromLocalCache {
            return self.execute_query_locally(query).into();
        }

        let entity_type = self
            .metadata
            .entity_type_for_resource_name(query.resource_name());
        let fetched = self
            .data_service
            .execute_query(query, entity_type.as_ref())
            .await;

        match (fetched, entity_type) {
            (Fetched::Found(values), Some(entity_type)) => {
                let merged = self.merge_results(&entity_type, values);
                debug!(resource = query.resource_name(), count = merged.len(), "Query results merged");
                Fetched::Found(merged)
            }
            (fetched, _) => fetched,
        }
    }

    fn merge_results(&self, entity_type: &EntityType, values: Vec<Value>) -> Vec<Value> {
        let mut cache = self.write_cache();
        values
            .into_iter()
            .filter_map(|value| match entity_type.key_of(&value) {
                Some(key) => {
                    let tracked = cache.merge_remote(&entity_type.name, key, value);
                    (!tracked.state.is_deleted()).then(|| tracked.current.clone())
                }
                None => Some(value),
            })
            .collect()
    }

    /// Executes a query against the cache only.
    ///
    /// Deleted entities are excluded. A resource that maps to no entity
    /// type yields an empty result.
    pub fn execute_query_locally(&self, query: &EntityQuery) -> DbResult<Vec<Value>> {
        let Some(entity_type) = self
            .metadata
            .entity_type_for_resource_name(query.resource_name())
        else {
            debug!(resource = query.resource_name(), "No entity type for resource, local query is empty");
            return Ok(Vec::new());
        };

        let results = self.read_cache().query(&entity_type.name, query.predicate());

        debug!(resource = query.resource_name(), count = results.len(), "Local query executed");
        Ok(results)
    }

    // =========================================================================
    // Change Tracking
    // =========================================================================

    /// Tracks persisted values as Unchanged, merging with any tracked copy.
    pub fn attach(&self, type_name: &str, values: Value) -> DbResult<EntityKey> {
        let (_, key) = self.identify(type_name, &values)?;
        self.write_cache().merge_remote(type_name, key.clone(), values);
        Ok(key)
    }

    /// Tracks a new entity as Added.
    pub fn add_entity(&self, type_name: &str, values: Value) -> DbResult<EntityKey> {
        let (_, key) = self.identify(type_name, &values)?;

        let mut cache = self.write_cache();
        if cache.get(type_name, &key).is_some() {
            return Err(DbError::invalid_state(type_name, &key, "an entity with this key is already tracked"));
        }
        cache.insert(TrackedEntity::added(type_name, key.clone(), values));

        debug!(entity_type = type_name, key = %key, "Entity added");
        Ok(key)
    }

    /// Replaces a tracked entity's values.
    ///
    /// An Unchanged entity becomes Modified only if the values differ.
    /// Returns the resulting state.
    pub fn update_entity(&self, type_name: &str, values: Value) -> DbResult<EntityState> {
        let (_, key) = self.identify(type_name, &values)?;

        let mut cache = self.write_cache();
        let tracked = cache
            .get_mut(type_name, &key)
            .ok_or_else(|| DbError::not_tracked(type_name, &key))?;

        match tracked.state {
            EntityState::Deleted => {
                return Err(DbError::invalid_state(type_name, &key, "entity is marked for deletion"));
            }
            EntityState::Unchanged if tracked.current == values => {}
            EntityState::Unchanged => {
                tracked.current = values;
                tracked.state = EntityState::Modified;
            }
            EntityState::Added | EntityState::Modified | EntityState::Detached => {
                tracked.current = values;
            }
        }

        Ok(tracked.state)
    }

    /// Marks an entity for deletion.
    ///
    /// An Added entity is simply detached. Returns the resulting state.
    pub fn delete_entity(&self, type_name: &str, key: &EntityKey) -> DbResult<EntityState> {
        let mut cache = self.write_cache();
        let tracked = cache
            .get_mut(type_name, key)
            .ok_or_else(|| DbError::not_tracked(type_name, key))?;

        if tracked.state.is_added() {
            cache.remove(type_name, key);
            return Ok(EntityState::Detached);
        }

        tracked.state = EntityState::Deleted;
        Ok(EntityState::Deleted)
    }

    /// Lifecycle state of an entity; Detached if not tracked.
    pub fn entity_state(&self, type_name: &str, key: &EntityKey) -> EntityState {
        self.read_cache()
            .get(type_name, key)
            .map_or(EntityState::Detached, |tracked| tracked.state)
    }

    /// True if any tracked entity is Added, Modified or Deleted.
    pub fn has_changes(&self) -> bool {
        self.read_cache().has_changes()
    }

    /// Persists every pending change as one batch.
    ///
    /// On success, saved entries become Unchanged (Deleted ones are
    /// detached). On failure the cache is left untouched and the error is
    /// returned. Returns the number of changes saved.
    pub async fn save_changes(&self) -> DbResult<usize> {
        let bundle = self.pending_bundle();
        if bundle.is_empty() {
            debug!("No pending changes to save");
            return Ok(0);
        }

        info!(changes = bundle.len(), "Saving changes");
        if let Err(err) = self.data_service.save_changes(&bundle).await {
            warn!(error = %err, changes = bundle.len(), "Save failed, changes remain pending");
            return Err(err);
        }

        let promoted = {
            let mut cache = self.write_cache();
            bundle
                .changes
                .iter()
                .filter(|change| cache.accept(change))
                .count()
        };

        info!(changes = bundle.len(), promoted, "Changes saved");
        Ok(bundle.len())
    }

    fn pending_bundle(&self) -> SaveBundle {
        let cache = self.read_cache();
        let changes = cache
            .pending()
            .into_iter()
            .map(|tracked| EntityChange {
                entity_type: tracked.entity_type.clone(),
                resource_name: self
                    .metadata
                    .get_entity_type(&tracked.entity_type, false)
                    .map_or_else(|| tracked.entity_type.clone(), |t| t.resource_name().to_string()),
                key: tracked.key.clone(),
                state: tracked.state,
                values: tracked.current.clone(),
            })
            .collect();

        SaveBundle { changes }
    }

    /// Discards all pending changes. Returns the number of entities reverted.
    pub fn reject_changes(&self) -> usize {
        let reverted = self.write_cache().reject_changes();
        info!(reverted, "Changes rejected");
        reverted
    }

    /// Detaches every tracked entity.
    pub fn clear(&self) {
        let mut cache = self.write_cache();
        let detached = cache.len();
        cache.clear();
        info!(detached, "Entity cache cleared");
    }

    /// Copies of the Unchanged entities of the given types.
    pub fn export_unchanged(&self, type_names: &[String]) -> Vec<TrackedEntity> {
        self.read_cache()
            .iter()
            .filter(|tracked| tracked.state.is_unchanged())
            .filter(|tracked| type_names.contains(&tracked.entity_type))
            .cloned()
            .collect()
    }

    /// Merges exported entities into this cache as Unchanged.
    pub fn import(&self, entities: Vec<TrackedEntity>) -> usize {
        let mut cache = self.write_cache();
        let count = entities.len();
        for tracked in entities {
            cache.merge_remote(&tracked.entity_type, tracked.key, tracked.current);
        }
        debug!(count, "Entities imported");
        count
    }

    // =========================================================================
    // Typed Helpers
    // =========================================================================

    fn ensure_registered<T: Entity>(&self) {
        if self.metadata.get_entity_type(T::TYPE_NAME, false).is_none() {
            self.metadata.register::<T>();
        }
    }

    /// Tracks a new typed entity as Added.
    pub fn add<T: Entity>(&self, entity: &T) -> DbResult<()> {
        self.ensure_registered::<T>();
        self.add_entity(T::TYPE_NAME, serde_json::to_value(entity)?)?;
        Ok(())
    }

    /// Tracks a persisted typed entity as Unchanged.
    pub fn attach_typed<T: Entity>(&self, entity: &T) -> DbResult<()> {
        self.ensure_registered::<T>();
        self.attach(T::TYPE_NAME, serde_json::to_value(entity)?)?;
        Ok(())
    }

    pub fn update<T: Entity>(&self, entity: &T) -> DbResult<EntityState> {
        self.update_entity(T::TYPE_NAME, serde_json::to_value(entity)?)
    }

    pub fn delete<T: Entity>(&self, entity: &T) -> DbResult<EntityState> {
        self.delete_entity(T::TYPE_NAME, &entity.key())
    }

    pub fn state_of<T: Entity>(&self, entity: &T) -> EntityState {
        self.entity_state(T::TYPE_NAME, &entity.key())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_service::mock::{Call, MockDataService};
    use serde_json::json;
    use temphire_core::Predicate;

    fn person(id: &str, name: &str) -> Value {
        json!({ "id": id, "name": name })
    }

    fn manager_with(service: MockDataService) -> (EntityManager, Arc<MockDataService>) {
        let metadata = Arc::new(MetadataStore::new());
        metadata.register_entity_type(EntityType::new("Person").with_default_resource_name("People"));
        let service = Arc::new(service);
        (EntityManager::new(metadata, service.clone()), service)
    }

    #[tokio::test]
    async fn test_fetch_by_key_uses_cache_first() {
        let (manager, service) =
            manager_with(MockDataService::new().with_entities("Person", vec![person("1", "Ann")]));

        let first = manager.fetch_entity_by_key("Person", &"1".into(), true).await;
        assert!(first.is_found());
        assert_eq!(manager.entity_state("Person", &"1".into()), EntityState::Unchanged);

        let second = manager.fetch_entity_by_key("Person", &"1".into(), true).await;
        assert!(second.is_found());
        assert_eq!(service.calls().len(), 1);

        manager.fetch_entity_by_key("Person", &"1".into(), false).await;
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_by_key_not_found_and_failure() {
        let (manager, service) = manager_with(MockDataService::new());

        let missing = manager.fetch_entity_by_key("Person", &"9".into(), true).await;
        assert!(missing.is_not_found());

        service.fail_reads(503);
        let failed = manager.fetch_entity_by_key("Person", &"9".into(), true).await;
        assert!(matches!(failed, Fetched::Failure(DbError::Remote { status: 503, .. })));

        let unknown = manager.fetch_entity_by_key("Planet", &"1".into(), true).await;
        assert!(matches!(unknown, Fetched::Failure(DbError::UnknownEntityType(_))));
    }

    #[tokio::test]
    async fn test_fetch_by_key_hides_locally_deleted_entity() {
        let (manager, _) =
            manager_with(MockDataService::new().with_entities("Person", vec![person("1", "Ann")]));
        manager.attach("Person", person("1", "Ann")).unwrap();
        manager.delete_entity("Person", &"1".into()).unwrap();

        let fetched = manager.fetch_entity_by_key("Person", &"1".into(), true).await;
        assert!(fetched.is_not_found());
        assert_eq!(manager.entity_state("Person", &"1".into()), EntityState::Deleted);
    }

    #[tokio::test]
    async fn test_local_strategy_never_calls_data_service() {
        let (manager, service) = manager_with(MockDataService::new());
        manager.attach("Person", person("1", "Ann")).unwrap();
        manager.attach("Person", person("2", "Bob")).unwrap();

        let query = EntityQuery::from_resource("People")
            .where_(Predicate::eq("name", "Bob"))
            .using(FetchStrategy::FromLocalCache);
        let Fetched::Found(values) = manager.execute_query(&query).await else {
            panic!("local query must succeed");
        };

        assert_eq!(values, vec![person("2", "Bob")]);
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_query_merges_and_preserves_changes() {
        let (manager, service) = manager_with(
            MockDataService::new()
                .with_entities("Person", vec![person("1", "Ann"), person("2", "Bob")]),
        );
        manager.attach("Person", person("1", "Ann")).unwrap();
        manager.update_entity("Person", person("1", "Anne")).unwrap();
        manager.attach("Person", person("2", "Bob")).unwrap();
        manager.delete_entity("Person", &"2".into()).unwrap();

        let Fetched::Found(values) = manager.execute_query(&EntityQuery::from_resource("People")).await
        else {
            panic!("remote query must succeed");
        };

        assert_eq!(values, vec![person("1", "Anne")]);
        assert_eq!(
            service.calls(),
            vec![Call::ExecuteQuery {
                resource: "People".to_string(),
                entity_type: Some("Person".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_unmapped_resource() {
        let (manager, service) = manager_with(MockDataService::new());

        let remote = manager.execute_query(&EntityQuery::from_resource("Planets")).await;
        assert!(remote.is_not_found());
        assert_eq!(
            service.calls(),
            vec![Call::ExecuteQuery {
                resource: "Planets".to_string(),
                entity_type: None,
            }]
        );

        let local = manager
            .execute_query_locally(&EntityQuery::from_resource("Planets"))
            .unwrap();
        assert!(local.is_empty());
    }

    #[test]
    fn test_change_tracking_transitions() {
        let (manager, _) = manager_with(MockDataService::new());
        let key: EntityKey = "1".into();

        manager.attach("Person", person("1", "Ann")).unwrap();
        assert_eq!(manager.update_entity("Person", person("1", "Ann")).unwrap(), EntityState::Unchanged);
        assert!(!manager.has_changes());

        assert_eq!(manager.update_entity("Person", person("1", "Anne")).unwrap(), EntityState::Modified);
        assert_eq!(manager.delete_entity("Person", &key).unwrap(), EntityState::Deleted);
        assert!(matches!(
            manager.update_entity("Person", person("1", "Annie")),
            Err(DbError::InvalidState { .. })
        ));

        assert_eq!(manager.reject_changes(), 1);
        assert_eq!(manager.entity_state("Person", &key), EntityState::Unchanged);
        assert_eq!(
            manager.execute_query_locally(&EntityQuery::from_resource("People")).unwrap(),
            vec![person("1", "Ann")]
        );
    }

    #[test]
    fn test_add_then_delete_detaches() {
        let (manager, _) = manager_with(MockDataService::new());

        manager.add_entity("Person", person("n", "New")).unwrap();
        assert!(manager.has_changes());
        assert!(matches!(
            manager.add_entity("Person", person("n", "Again")),
            Err(DbError::InvalidState { .. })
        ));

        assert_eq!(manager.delete_entity("Person", &"n".into()).unwrap(), EntityState::Detached);
        assert!(!manager.has_changes());
        assert!(matches!(
            manager.delete_entity("Person", &"n".into()),
            Err(DbError::NotTracked { .. })
        ));
    }

    #[test]
    fn test_entities_without_key_are_rejected() {
        let (manager, _) = manager_with(MockDataService::new());

        assert!(matches!(
            manager.add_entity("Person", json!({ "name": "Nobody" })),
            Err(DbError::InvalidState { .. })
        ));
        assert!(matches!(
            manager.add_entity("Planet", json!({ "id": "1" })),
            Err(DbError::UnknownEntityType(_))
        ));
    }

    #[tokio::test]
    async fn test_save_changes_promotes_on_success() {
        let (manager, service) = manager_with(MockDataService::new());
        manager.add_entity("Person", person("1", "Ann")).unwrap();
        manager.attach("Person", person("2", "Bob")).unwrap();
        manager.delete_entity("Person", &"2".into()).unwrap();

        assert_eq!(manager.save_changes().await.unwrap(), 2);

        assert!(!manager.has_changes());
        assert_eq!(manager.entity_state("Person", &"1".into()), EntityState::Unchanged);
        assert_eq!(manager.entity_state("Person", &"2".into()), EntityState::Detached);
        assert_eq!(service.stored("Person"), vec![person("1", "Ann")]);

        assert_eq!(manager.save_changes().await.unwrap(), 0);
        assert_eq!(service.calls(), vec![Call::SaveChanges { changes: 2 }]);
    }

    #[tokio::test]
    async fn test_save_changes_failure_keeps_changes() {
        let (manager, service) = manager_with(MockDataService::new());
        service.fail_saves(true);
        manager.add_entity("Person", person("1", "Ann")).unwrap();

        assert!(matches!(manager.save_changes().await, Err(DbError::Remote { status: 500, .. })));
        assert!(manager.has_changes());
        assert_eq!(manager.entity_state("Person", &"1".into()), EntityState::Added);
    }

    #[test]
    fn test_export_and_import_unchanged() {
        let (master, _) = manager_with(MockDataService::new());
        master.attach("Person", person("1", "Ann")).unwrap();
        master.add_entity("Person", person("2", "Pending")).unwrap();

        let exported = master.export_unchanged(&["Person".to_string()]);
        assert_eq!(exported.len(), 1);

        let session = EntityManager::new(master.metadata_store().clone(), master.data_service().clone());
        assert_eq!(session.import(exported), 1);
        assert_eq!(session.entity_state("Person", &"1".into()), EntityState::Unchanged);
        assert_eq!(session.entity_state("Person", &"2".into()), EntityState::Detached);

        session.clear();
        assert_eq!(session.entity_state("Person", &"1".into()), EntityState::Detached);
        assert_eq!(master.entity_state("Person", &"1".into()), EntityState::Unchanged);
    }

    #[test]
    fn test_cache_usable_after_panic_while_locked() {
        let (manager, _) = manager_with(MockDataService::new());
        manager.add_entity("Person", person("1", "Ann")).unwrap();
        let manager = Arc::new(manager);

        let crashed = {
            let manager = manager.clone();
            std::thread::spawn(move || {
                let _cache = manager.write_cache();
                panic!("editor crashed mid-update");
            })
            .join()
        };
        assert!(crashed.is_err());

        assert!(manager.has_changes());
        let people = manager
            .execute_query_locally(&EntityQuery::from_resource("People"))
            .unwrap();
        assert_eq!(people, vec![person("1", "Ann")]);
        assert_eq!(manager.reject_changes(), 1);
    }
}
