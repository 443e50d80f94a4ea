//! # Unit of Work
//!
//! Session-scoped commit / rollback over one entity manager.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Unit of Work                                    │
//! │                                                                         │
//! │  repositories ──► entities tracked by the session's EntityManager      │
//! │                                                                         │
//! │  edit / add / delete ──► has_changes() == true                         │
//! │       │                                                                 │
//! │       ├── commit().await  ──► one batch to the DataService             │
//! │       │                       success: Unchanged, has_changes false    │
//! │       │                       failure: error, changes stay pending     │
//! │       │                                                                 │
//! │       └── rollback()      ──► Added detached, edits reverted           │
//! │                                                                         │
//! │  clear() ──► detaches everything, re-imports prepared lookups          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use temphire_core::{Entity, EntityState};
use tracing::{debug, info};

use super::Repository;
use crate::error::DbResult;
use crate::manager::{EntityManager, EntityManagerProvider, TrackedEntity};

/// Pending-change set of one editing session.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    manager: Arc<EntityManager>,
    lookups: Arc<[TrackedEntity]>,
}

impl UnitOfWork {
    /// Creates a unit of work over an existing manager, with no lookups to
    /// restore on [`clear`](Self::clear).
    pub fn new(manager: Arc<EntityManager>) -> Self {
        UnitOfWork {
            manager,
            lookups: Arc::from(Vec::new()),
        }
    }

    /// Creates a unit of work over a fresh session manager from `provider`.
    ///
    /// The prepared lookups are kept so `clear` can put them back.
    pub fn from_provider(provider: &EntityManagerProvider) -> Self {
        let lookups = provider.lookup_snapshot();
        UnitOfWork {
            manager: provider.session_manager(lookups.clone()),
            lookups: Arc::from(lookups),
        }
    }

    pub fn manager(&self) -> &Arc<EntityManager> {
        &self.manager
    }

    /// True if any tracked entity is Added, Modified or Deleted.
    pub fn has_changes(&self) -> bool {
        self.manager.has_changes()
    }

    /// Persists every pending change. Returns the number of changes saved.
    pub async fn commit(&self) -> DbResult<usize> {
        let saved = self.manager.save_changes().await?;
        info!(saved, "Unit of work committed");
        Ok(saved)
    }

    /// Discards every pending change.
    pub fn rollback(&self) {
        let reverted = self.manager.reject_changes();
        info!(reverted, "Unit of work rolled back");
    }

    /// Detaches every tracked entity, pending or not, then re-imports the
    /// prepared lookups this session started with.
    pub fn clear(&self) {
        self.manager.clear();
        if !self.lookups.is_empty() {
            let restored = self.manager.import(self.lookups.to_vec());
            debug!(restored, "Lookups restored after clear");
        }
    }

    /// Tracks a new entity as Added.
    pub fn add<T: Entity>(&self, entity: &T) -> DbResult<()> {
        self.manager.add(entity)
    }

    /// Records edits to a tracked entity. Returns the resulting state.
    pub fn update<T: Entity>(&self, entity: &T) -> DbResult<EntityState> {
        self.manager.update(entity)
    }

    /// Marks a tracked entity for deletion. Returns the resulting state.
    pub fn delete<T: Entity>(&self, entity: &T) -> DbResult<EntityState> {
        self.manager.delete(entity)
    }

    pub fn entity_state<T: Entity>(&self, entity: &T) -> EntityState {
        self.manager.state_of(entity)
    }

    /// A repository for `T` sharing this session's manager.
    pub fn repository<T: Entity>(&self, resource_name: &str, is_cached_bundle: bool) -> Repository<T> {
        Repository::for_entity(self.manager.clone(), resource_name, is_cached_bundle)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_service::mock::{Call, MockDataService};
    use temphire_core::{MetadataStore, State};

    fn washington() -> State {
        State {
            id: "wa".to_string(),
            short_name: "WA".to_string(),
            name: "Washington".to_string(),
        }
    }

    fn unit_of_work() -> (UnitOfWork, Arc<MockDataService>) {
        let service = Arc::new(MockDataService::new());
        let manager = EntityManager::new(Arc::new(MetadataStore::new()), service.clone());
        (UnitOfWork::new(Arc::new(manager)), service)
    }

    #[tokio::test]
    async fn test_commit_clears_pending_changes() {
        let (uow, service) = unit_of_work();
        let state = washington();

        uow.add(&state).unwrap();
        assert!(uow.has_changes());
        assert_eq!(uow.entity_state(&state), EntityState::Added);

        assert_eq!(uow.commit().await.unwrap(), 1);
        assert!(!uow.has_changes());
        assert_eq!(uow.entity_state(&state), EntityState::Unchanged);
        assert_eq!(service.calls(), vec![Call::SaveChanges { changes: 1 }]);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_changes() {
        let (uow, service) = unit_of_work();
        service.fail_saves(true);
        uow.add(&washington()).unwrap();

        assert!(uow.commit().await.is_err());
        assert!(uow.has_changes());

        service.fail_saves(false);
        uow.commit().await.unwrap();
        assert!(!uow.has_changes());
    }

    #[tokio::test]
    async fn test_rollback_restores_modified_and_deleted() {
        let (uow, _) = unit_of_work();
        let original = washington();
        uow.add(&original).unwrap();
        uow.commit().await.unwrap();

        let mut edited = original.clone();
        edited.name = "Evergreen State".to_string();
        assert_eq!(uow.update(&edited).unwrap(), EntityState::Modified);

        uow.rollback();
        assert!(!uow.has_changes());
        let states = uow.repository::<State>("Lookups", true).all().await.unwrap();
        assert_eq!(states, vec![original.clone()]);

        assert_eq!(uow.delete(&original).unwrap(), EntityState::Deleted);
        assert!(uow.has_changes());
        uow.rollback();
        assert_eq!(uow.entity_state(&original), EntityState::Unchanged);
    }

    #[tokio::test]
    async fn test_commit_delete_detaches() {
        let (uow, _) = unit_of_work();
        let state = washington();
        uow.add(&state).unwrap();
        uow.commit().await.unwrap();

        uow.delete(&state).unwrap();
        uow.commit().await.unwrap();
        assert_eq!(uow.entity_state(&state), EntityState::Detached);
    }

    #[test]
    fn test_clear_detaches_everything() {
        let (uow, _) = unit_of_work();
        let state = washington();
        uow.add(&state).unwrap();

        uow.clear();
        assert!(!uow.has_changes());
        assert_eq!(uow.entity_state(&state), EntityState::Detached);
    }

    #[tokio::test]
    async fn test_clear_keeps_prepared_lookups() {
        let service = Arc::new(MockDataService::new().with_entities(
            "State",
            vec![serde_json::to_value(washington()).unwrap()],
        ));
        let provider = EntityManagerProvider::new(service.clone());
        provider.prepare().await.unwrap();
        let prepared_calls = service.calls().len();

        let uow = UnitOfWork::from_provider(&provider);
        let oregon = State {
            id: "or".to_string(),
            short_name: "OR".to_string(),
            name: "Oregon".to_string(),
        };
        uow.add(&oregon).unwrap();
        let mut renamed = washington();
        renamed.name = "Evergreen State".to_string();
        uow.update(&renamed).unwrap();

        uow.clear();

        assert!(!uow.has_changes());
        assert_eq!(uow.entity_state(&oregon), EntityState::Detached);
        let states = uow.repository::<State>("Lookups", true).all().await.unwrap();
        assert_eq!(states, vec![washington()]);
        assert_eq!(service.calls().len(), prepared_calls);
    }
}
