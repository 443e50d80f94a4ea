//! # Repository Module
//!
//! Typed query access to one entity type through an [`EntityManager`].
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  Resource detail screen                                                │
//! │       │                                                                 │
//! │       │  uow.staffing_resources().with_id(id)?.await?                  │
//! │       ▼                                                                 │
//! │  Repository<StaffingResource>                                          │
//! │  ├── with_id(key)          by key, cache first                         │
//! │  ├── where_(predicate)     default fetch strategy                      │
//! │  ├── where_in_cache(pred)  cache only, synchronous                     │
//! │  └── all()                                                             │
//! │       │                                                                 │
//! │       │  EntityQuery + FetchStrategy                                   │
//! │       ▼                                                                 │
//! │  EntityManager ──► cache or DataService                                │
//! │                                                                         │
//! │  Cached bundles (lookups) default to FromLocalCache and are queried    │
//! │  by entity type name; everything else defaults to FromServer.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Not Found
//! A remote "not found" is an expected outcome: `with_id` answers `None`
//! and queries answer an empty list. Every other failure propagates as-is.
//!
//! ## Available Units of Work
//!
//! - [`UnitOfWork`] - Commit / rollback over one entity manager
//! - [`ResourceMgtUnitOfWork`] - TempHire staffing resource session

pub mod resource_mgt;
pub mod unit_of_work;

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use temphire_core::{Entity, EntityKey, FetchStrategy, Predicate};
use tracing::{debug, warn};

use crate::data_service::Fetched;
use crate::error::{DbError, DbResult};
use crate::manager::EntityManager;
use crate::query::EntityQuery;

pub use resource_mgt::{ResourceMgtUnitOfWork, StaffingResourceFactory};
pub use unit_of_work::UnitOfWork;

/// Query access to entities of type `T`.
pub struct Repository<T: Entity> {
    manager: Arc<EntityManager>,
    entity_type_name: Option<String>,
    resource_name: String,
    is_cached_bundle: bool,
    default_strategy: FetchStrategy,
    bound: AtomicBool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity_type_name", &self.entity_type_name)
            .field("resource_name", &self.resource_name)
            .field("is_cached_bundle", &self.is_cached_bundle)
            .field("default_strategy", &self.default_strategy)
            .field("bound", &self.bound.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Entity> Repository<T> {
    /// Creates a repository.
    ///
    /// ## Arguments
    /// * `entity_type_name` - `None` restricts the repository to
    ///   resource-name queries; `with_id` then fails.
    /// * `resource_name` - collection the queries target
    /// * `is_cached_bundle` - reference data served from the local cache
    pub fn new(
        manager: Arc<EntityManager>,
        entity_type_name: Option<&str>,
        resource_name: impl Into<String>,
        is_cached_bundle: bool,
    ) -> Self {
        Repository {
            manager,
            entity_type_name: entity_type_name.map(str::to_string),
            resource_name: resource_name.into(),
            is_cached_bundle,
            default_strategy: FetchStrategy::for_bundle(is_cached_bundle),
            bound: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    /// Creates a repository for `T`'s own entity type.
    pub fn for_entity(
        manager: Arc<EntityManager>,
        resource_name: impl Into<String>,
        is_cached_bundle: bool,
    ) -> Self {
        Self::new(manager, Some(T::TYPE_NAME), resource_name, is_cached_bundle)
    }

    pub fn entity_type_name(&self) -> Option<&str> {
        self.entity_type_name.as_deref()
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn is_cached_bundle(&self) -> bool {
        self.is_cached_bundle
    }

    pub fn default_strategy(&self) -> FetchStrategy {
        self.default_strategy
    }

    /// Resource name queries are built on.
    ///
    /// Cached bundles are addressed by entity type name.
    pub fn local_resource_name(&self) -> &str {
        match (&self.entity_type_name, self.is_cached_bundle) {
            (Some(type_name), true) => type_name,
            _ => &self.resource_name,
        }
    }

    /// Binds the local resource name to the entity type in the shared
    /// metadata store, once per repository.
    ///
    /// Repositories without an entity type have nothing to bind. A type
    /// the metadata store does not know is an error, and the binding is
    /// retried on the next call.
    pub fn ensure_resource_binding(&self) -> DbResult<()> {
        if self.bound.load(Ordering::Acquire) {
            return Ok(());
        }

        if let Some(type_name) = &self.entity_type_name {
            let metadata = self.manager.metadata_store();
            metadata
                .get_entity_type(type_name, false)
                .ok_or_else(|| DbError::UnknownEntityType(type_name.clone()))?;

            let resource_name = self.local_resource_name();
            metadata.bind_resource_name(type_name, resource_name)?;
            debug!(entity_type = %type_name, resource = resource_name, "Resource name bound");
        }

        self.bound.store(true, Ordering::Release);
        Ok(())
    }

    /// The entity manager, with the resource binding applied.
    pub fn manager(&self) -> DbResult<&EntityManager> {
        self.ensure_resource_binding()?;
        Ok(&self.manager)
    }

    /// Looks up one entity by key, checking the cache first.
    ///
    /// Fails immediately, before any lookup is started, if the repository
    /// has no entity type.
    ///
    /// ```rust,ignore
    /// let resource = uow.staffing_resources().with_id(id)?.await?;
    /// ```
    pub fn with_id(&self, key: impl Into<EntityKey>) -> DbResult<BoxFuture<'_, DbResult<Option<T>>>> {
        let type_name = self
            .entity_type_name
            .clone()
            .ok_or_else(DbError::missing_entity_type)?;
        let key = key.into();

        Ok(async move {
            let manager = self.manager()?;
            match manager.fetch_entity_by_key(&type_name, &key, true).await {
                Fetched::Found(value) => Ok(Some(serde_json::from_value(value)?)),
                Fetched::NotFound => {
                    warn!(entity_type = %type_name, key = %key, "Entity not found");
                    Ok(None)
                }
                Fetched::Failure(err) => Err(err),
            }
        }
        .boxed())
    }

    /// Entities matching `predicate`, under the default fetch strategy.
    pub async fn where_(&self, predicate: Predicate) -> DbResult<Vec<T>> {
        self.where_with(predicate, self.default_strategy).await
    }

    /// Entities matching `predicate`, under an explicit fetch strategy.
    pub async fn where_with(&self, predicate: Predicate, strategy: FetchStrategy) -> DbResult<Vec<T>> {
        let manager = self.manager()?;
        let query = EntityQuery::from_resource(self.local_resource_name())
            .where_(predicate)
            .using(strategy);

        match manager.execute_query(&query).await {
            Fetched::Found(values) => into_entities(values),
            Fetched::NotFound => {
                warn!(resource = query.resource_name(), "Resource not found, returning no entities");
                Ok(Vec::new())
            }
            Fetched::Failure(err) => Err(err),
        }
    }

    /// Entities matching `predicate` in the local cache only.
    pub fn where_in_cache(&self, predicate: Predicate) -> DbResult<Vec<T>> {
        let manager = self.manager()?;
        let query = EntityQuery::from_resource(self.local_resource_name())
            .where_(predicate)
            .using(FetchStrategy::FromLocalCache);

        into_entities(manager.execute_query_locally(&query)?)
    }

    /// Every entity, under the default fetch strategy.
    pub async fn all(&self) -> DbResult<Vec<T>> {
        self.where_(Predicate::True).await
    }

    /// Every entity, under an explicit fetch strategy.
    pub async fn all_with(&self, strategy: FetchStrategy) -> DbResult<Vec<T>> {
        self.where_with(Predicate::True, strategy).await
    }
}

fn into_entities<T: Entity>(values: Vec<Value>) -> DbResult<Vec<T>> {
    values
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(DbError::from))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_service::mock::{Call, MockDataService};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use temphire_core::MetadataStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        id: String,
        name: String,
    }

    impl Entity for Person {
        const TYPE_NAME: &'static str = "Person";

        fn key(&self) -> EntityKey {
            EntityKey::new(&self.id)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Country {
        id: String,
    }

    impl Entity for Country {
        const TYPE_NAME: &'static str = "Country";

        fn key(&self) -> EntityKey {
            EntityKey::new(&self.id)
        }
    }

    fn setup(service: MockDataService) -> (Arc<EntityManager>, Arc<MockDataService>) {
        let metadata = Arc::new(MetadataStore::new());
        metadata.register::<Person>();
        metadata.register::<Country>();
        let service = Arc::new(service);
        (Arc::new(EntityManager::new(metadata, service.clone())), service)
    }

    fn people() -> MockDataService {
        MockDataService::new().with_entities(
            "Person",
            vec![json!({ "id": "1", "name": "Ann" }), json!({ "id": "2", "name": "Bob" })],
        )
    }

    #[test]
    fn test_default_strategy_follows_cached_bundle_flag() {
        let (manager, _) = setup(MockDataService::new());

        let remote = Repository::<Person>::for_entity(manager.clone(), "People", false);
        assert_eq!(remote.default_strategy(), FetchStrategy::FromServer);
        assert_eq!(remote.local_resource_name(), "People");

        let bundle = Repository::<Country>::for_entity(manager, "Lookups", true);
        assert_eq!(bundle.default_strategy(), FetchStrategy::FromLocalCache);
        assert_eq!(bundle.local_resource_name(), "Country");
    }

    #[tokio::test]
    async fn test_cached_bundle_never_calls_data_service() {
        let (manager, service) = setup(MockDataService::new());
        let countries = Repository::<Country>::for_entity(manager.clone(), "Lookups", true);

        assert!(countries.all().await.unwrap().is_empty());

        manager.attach("Country", json!({ "id": "nz" })).unwrap();
        assert_eq!(
            countries.all().await.unwrap(),
            vec![Country { id: "nz".to_string() }]
        );
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_where_goes_to_server_by_default() {
        let (manager, service) = setup(people());
        let repo = Repository::<Person>::for_entity(manager, "People", false);

        let found = repo.where_(Predicate::eq("name", "Bob")).await.unwrap();
        assert_eq!(found, vec![Person { id: "2".to_string(), name: "Bob".to_string() }]);
        assert_eq!(
            service.calls(),
            vec![Call::ExecuteQuery {
                resource: "People".to_string(),
                entity_type: Some("Person".to_string()),
            }]
        );

        let cached = repo.where_in_cache(Predicate::True).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_where_with_overrides_strategy() {
        let (manager, service) = setup(MockDataService::new().with_entities("Country", vec![json!({ "id": "nz" })]));
        let countries = Repository::<Country>::for_entity(manager, "Lookups", true);

        let fetched = countries.all_with(FetchStrategy::FromServer).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(service.query_calls(), 1);

        assert_eq!(countries.all().await.unwrap().len(), 1);
        assert_eq!(service.query_calls(), 1);
    }

    #[tokio::test]
    async fn test_where_not_found_is_empty_and_failures_propagate() {
        let (manager, service) = setup(people());
        service.remove_resource("People");
        let repo = Repository::<Person>::for_entity(manager, "People", false);

        assert!(repo.where_(Predicate::eq("name", "Ann")).await.unwrap().is_empty());

        service.fail_reads(500);
        assert!(matches!(repo.all().await, Err(DbError::Remote { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_with_id() {
        let (manager, service) = setup(people());
        let repo = Repository::<Person>::for_entity(manager, "People", false);

        let ann = repo.with_id("1").unwrap().await.unwrap();
        assert_eq!(ann.map(|p| p.name), Some("Ann".to_string()));
        assert!(repo.with_id("42").unwrap().await.unwrap().is_none());

        service.fail_reads(401);
        assert!(matches!(
            repo.with_id("43").unwrap().await,
            Err(DbError::Remote { status: 401, .. })
        ));
        // cached, so no failure
        assert!(repo.with_id("1").unwrap().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_with_id_requires_entity_type() {
        let (manager, service) = setup(people());
        let untyped = Repository::<Person>::new(manager.clone(), None, "People", false);

        for key in ["1", "42", ""] {
            let err = untyped.with_id(key).err().unwrap();
            assert!(err.is_configuration());
            assert_eq!(err.to_string(), "Repository must be created with an entity type specified");
        }
        assert!(service.calls().is_empty());

        // Resource queries still work once the resource is mapped.
        Repository::<Person>::for_entity(manager, "People", false)
            .ensure_resource_binding()
            .unwrap();
        assert_eq!(untyped.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resource_binding_happens_once() {
        let (manager, service) = setup(people());
        let metadata = manager.metadata_store().clone();
        let repo = Repository::<Person>::for_entity(manager, "People", false);

        repo.all().await.unwrap();
        let bound = metadata.get_entity_type("Person", false).unwrap();
        assert_eq!(bound.default_resource_name.as_deref(), Some("People"));
        assert_eq!(metadata.entity_type_for_resource_name("People").unwrap().name, "Person");

        metadata.bind_resource_name("Person", "Persons").unwrap();
        repo.all().await.unwrap();
        repo.where_in_cache(Predicate::True).unwrap();

        let after = metadata.get_entity_type("Person", false).unwrap();
        assert_eq!(after.default_resource_name.as_deref(), Some("Persons"));
        assert_eq!(service.query_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_entity_type_is_an_error() {
        let (manager, service) = setup(MockDataService::new());
        let repo = Repository::<Person>::new(manager, Some("Planet"), "Planets", false);

        assert!(matches!(repo.all().await, Err(DbError::UnknownEntityType(ref name)) if name == "Planet"));
        assert!(matches!(
            repo.with_id("1").unwrap().await,
            Err(DbError::UnknownEntityType(_))
        ));
        assert!(service.calls().is_empty());
    }
}
