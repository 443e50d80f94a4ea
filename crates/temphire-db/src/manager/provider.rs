//! # Entity Manager Provider
//!
//! Hands out one entity manager per editing session.
//!
//! ## Session Managers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     EntityManagerProvider                               │
//! │                                                                         │
//! │  Arc<MetadataStore> ◄──────── shared by every manager ───────┐         │
//! │  Arc<dyn DataService> ◄────── shared by every manager ───────┤         │
//! │                                                              │         │
//! │  master manager ── prepare() loads lookups once ──┐          │         │
//! │                                                   │ export    │         │
//! │                                                   ▼ unchanged │         │
//! │  new_manager() ──► fresh session manager ◄── import ─────────┘         │
//! │                    (own cache, own pending changes)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use temphire_core::{
    Address, AddressType, Entity, FetchStrategy, MetadataStore, PhoneNumber, PhoneNumberType,
    StaffingResource, State, ADDRESSES, PHONE_NUMBERS, STAFFING_RESOURCES,
};
use tracing::{debug, info, warn};

use super::{EntityManager, TrackedEntity};
use crate::data_service::{DataService, Fetched};
use crate::error::{DbError, DbResult};
use crate::query::EntityQuery;

/// Lookup types preloaded into every session unless configured otherwise.
pub const DEFAULT_LOOKUP_TYPES: [&str; 3] = [
    State::TYPE_NAME,
    AddressType::TYPE_NAME,
    PhoneNumberType::TYPE_NAME,
];

/// Creates session entity managers over one data service.
#[derive(Debug)]
pub struct EntityManagerProvider {
    metadata: Arc<MetadataStore>,
    data_service: Arc<dyn DataService>,
    master: EntityManager,
    lookup_types: Vec<String>,
    prepared: AtomicBool,
}

impl EntityManagerProvider {
    /// Creates a provider with the TempHire entity types registered.
    ///
    /// Lookup types keep their type name as resource name, matching how
    /// cached-bundle repositories address them.
    pub fn new(data_service: Arc<dyn DataService>) -> Self {
        let metadata = Arc::new(MetadataStore::new());
        metadata.register_entity_type(
            StaffingResource::entity_type().with_default_resource_name(STAFFING_RESOURCES),
        );
        metadata.register_entity_type(Address::entity_type().with_default_resource_name(ADDRESSES));
        metadata.register_entity_type(
            PhoneNumber::entity_type().with_default_resource_name(PHONE_NUMBERS),
        );
        metadata.register::<State>();
        metadata.register::<AddressType>();
        metadata.register::<PhoneNumberType>();

        Self::with_metadata(metadata, data_service)
    }

    /// Creates a provider over an existing metadata store.
    pub fn with_metadata(metadata: Arc<MetadataStore>, data_service: Arc<dyn DataService>) -> Self {
        EntityManagerProvider {
            master: EntityManager::new(metadata.clone(), data_service.clone()),
            metadata,
            data_service,
            lookup_types: DEFAULT_LOOKUP_TYPES.iter().map(|t| t.to_string()).collect(),
            prepared: AtomicBool::new(false),
        }
    }

    /// Replaces the set of lookup types loaded by [`prepare`](Self::prepare).
    pub fn with_lookup_types<I, S>(mut self, lookup_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lookup_types = lookup_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn lookup_types(&self) -> &[String] {
        &self.lookup_types
    }

    pub fn metadata_store(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    /// True once [`prepare`](Self::prepare) has completed.
    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }

    /// Loads every lookup type from the server into the master cache.
    ///
    /// A lookup collection the server does not know is skipped with a
    /// warning; any other failure aborts. Returns the number of lookup
    /// entities loaded.
    pub async fn prepare(&self) -> DbResult<usize> {
        let mut loaded = 0;

        for type_name in &self.lookup_types {
            let entity_type = self
                .metadata
                .get_entity_type(type_name, false)
                .ok_or_else(|| DbError::UnknownEntityType(type_name.clone()))?;

            let query = EntityQuery::from_resource(entity_type.resource_name())
                .using(FetchStrategy::FromServer);

            match self.master.execute_query(&query).await {
                Fetched::Found(values) => {
                    debug!(entity_type = %type_name, count = values.len(), "Lookup loaded");
                    loaded += values.len();
                }
                Fetched::NotFound => {
                    warn!(entity_type = %type_name, "Lookup collection not found, skipping");
                }
                Fetched::Failure(err) => return Err(err),
            }
        }

        self.prepared.store(true, Ordering::Release);
        info!(loaded, types = self.lookup_types.len(), "Lookups prepared");
        Ok(loaded)
    }

    /// Copies of the lookup entities loaded by [`prepare`](Self::prepare).
    pub fn lookup_snapshot(&self) -> Vec<TrackedEntity> {
        self.master.export_unchanged(&self.lookup_types)
    }

    /// Creates a session manager seeded with the prepared lookups.
    pub fn new_manager(&self) -> Arc<EntityManager> {
        self.session_manager(self.lookup_snapshot())
    }

    pub(crate) fn session_manager(&self, lookups: Vec<TrackedEntity>) -> Arc<EntityManager> {
        let manager = EntityManager::new(self.metadata.clone(), self.data_service.clone());
        manager.import(lookups);
        Arc::new(manager)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
