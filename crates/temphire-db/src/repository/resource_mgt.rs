//! # Resource Management Unit of Work
//!
//! The session aggregate behind the staffing resource detail screen.
//!
//! ## Repositories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository             Entity type        Resource            Default │
//! │  ──────────────────     ───────────────    ─────────────────   ─────── │
//! │  staffing_resources     StaffingResource   StaffingResources   server  │
//! │  addresses              Address            Addresses           server  │
//! │  phone_numbers          PhoneNumber        PhoneNumbers        server  │
//! │  states                 State              Lookups (bundle)    cache   │
//! │  address_types          AddressType        Lookups (bundle)    cache   │
//! │  phone_number_types     PhoneNumberType    Lookups (bundle)    cache   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use temphire_core::{
    Address, AddressType, EntityState, PhoneNumber, PhoneNumberType, StaffingResource,
    StaffingResourceConfig, StaffingResourceName, State, ADDRESSES, LOOKUPS_RESOURCE,
    PHONE_NUMBERS, STAFFING_RESOURCES,
};
use tracing::debug;
use uuid::Uuid;

use super::{Repository, UnitOfWork};
use crate::error::DbResult;
use crate::manager::{EntityManager, EntityManagerProvider};

// =============================================================================
// Factory
// =============================================================================

/// Creates new staffing resources inside a session.
#[derive(Debug, Clone)]
pub struct StaffingResourceFactory {
    manager: Arc<EntityManager>,
}

impl StaffingResourceFactory {
    pub fn new(manager: Arc<EntityManager>) -> Self {
        StaffingResourceFactory { manager }
    }

    /// Builds a validated staffing resource with a fresh UUID and tracks it
    /// as Added. Nothing is persisted until the session commits.
    pub fn create(&self, config: &StaffingResourceConfig) -> DbResult<StaffingResource> {
        let id = Uuid::new_v4().to_string();
        let resource = StaffingResource::from_config(id, config, Utc::now())?;

        self.manager.add(&resource)?;
        debug!(id = %resource.id, name = %resource.full_name(), "Staffing resource created");
        Ok(resource)
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// Unit of work for editing staffing resources.
#[derive(Debug)]
pub struct ResourceMgtUnitOfWork {
    uow: UnitOfWork,
    staffing_resources: Repository<StaffingResource>,
    addresses: Repository<Address>,
    phone_numbers: Repository<PhoneNumber>,
    states: Repository<State>,
    address_types: Repository<AddressType>,
    phone_number_types: Repository<PhoneNumberType>,
    staffing_resource_factory: StaffingResourceFactory,
}

impl ResourceMgtUnitOfWork {
    /// Creates the session over an existing manager.
    pub fn new(manager: Arc<EntityManager>) -> Self {
        Self::with_unit_of_work(UnitOfWork::new(manager))
    }

    /// Creates the session over a fresh manager from `provider`.
    ///
    /// [`clear`](Self::clear) keeps the provider's prepared lookups.
    pub fn from_provider(provider: &EntityManagerProvider) -> Self {
        Self::with_unit_of_work(UnitOfWork::from_provider(provider))
    }

    fn with_unit_of_work(uow: UnitOfWork) -> Self {
        let manager = uow.manager().clone();

        ResourceMgtUnitOfWork {
            staffing_resources: uow.repository(STAFFING_RESOURCES, false),
            addresses: uow.repository(ADDRESSES, false),
            phone_numbers: uow.repository(PHONE_NUMBERS, false),
            states: uow.repository(LOOKUPS_RESOURCE, true),
            address_types: uow.repository(LOOKUPS_RESOURCE, true),
            phone_number_types: uow.repository(LOOKUPS_RESOURCE, true),
            staffing_resource_factory: StaffingResourceFactory::new(manager),
            uow,
        }
    }

    pub fn staffing_resources(&self) -> &Repository<StaffingResource> {
        &self.staffing_resources
    }

    pub fn addresses(&self) -> &Repository<Address> {
        &self.addresses
    }

    pub fn phone_numbers(&self) -> &Repository<PhoneNumber> {
        &self.phone_numbers
    }

    pub fn states(&self) -> &Repository<State> {
        &self.states
    }

    pub fn address_types(&self) -> &Repository<AddressType> {
        &self.address_types
    }

    pub fn phone_number_types(&self) -> &Repository<PhoneNumberType> {
        &self.phone_number_types
    }

    pub fn staffing_resource_factory(&self) -> &StaffingResourceFactory {
        &self.staffing_resource_factory
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    pub fn has_changes(&self) -> bool {
        self.uow.has_changes()
    }

    pub async fn commit(&self) -> DbResult<usize> {
        self.uow.commit().await
    }

    pub fn rollback(&self) {
        self.uow.rollback();
    }

    /// Detaches everything except the prepared lookups.
    pub fn clear(&self) {
        self.uow.clear();
    }

    /// Applies an edited name to a tracked staffing resource.
    ///
    /// The name is validated first; an invalid name leaves both the
    /// resource and its tracked state untouched.
    pub fn set_name(
        &self,
        resource: &mut StaffingResource,
        name: &StaffingResourceName,
    ) -> DbResult<EntityState> {
        let mut renamed = resource.clone();
        renamed.apply_name(name)?;

        let state = self.uow.update(&renamed)?;
        *resource = renamed;
        Ok(state)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
