//! # Domain Types
//!
//! Entity identity, lifecycle and the TempHire entity model.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌─────────────────┐   ┌─────────────────┐      │
//! │  │ StaffingResource │   │     Address     │   │   PhoneNumber   │      │
//! │  │  ──────────────  │   │  ─────────────  │   │  ─────────────  │      │
//! │  │  id (UUID)       │◄──│  resource id    │   │  resource id    │──┐   │
//! │  │  first/last name │   │  state_id ──────┼─┐ │  type id        │  │   │
//! │  └──────────────────┘   └─────────────────┘ │ └─────────────────┘  │   │
//! │                                             ▼                      │   │
//! │  Lookups (cached bundle):  ┌───────┐ ┌─────────────┐ ┌──────────────┐  │
//! │                            │ State │ │ AddressType │ │PhoneNumberType│ │
//! │                            └───────┘ └─────────────┘ └──────────────┘  │
//! │                                                                         │
//! │  Lifecycle: EntityState   Query routing: FetchStrategy                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::metadata::EntityType;
use crate::validation::{validate_key, validate_optional_name, validate_person_name, ValidationResult};

// =============================================================================
// Entity Key
// =============================================================================

/// Identifies one entity within its entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    /// Creates a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        EntityKey(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts a key from a JSON key property value.
    ///
    /// Strings are used as-is, numbers by their decimal rendering.
    /// Anything else (null, objects, arrays) has no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(EntityKey(s.clone())),
            Value::Number(n) => Some(EntityKey(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        EntityKey(key.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(key: String) -> Self {
        EntityKey(key)
    }
}

impl From<&String> for EntityKey {
    fn from(key: &String) -> Self {
        EntityKey(key.clone())
    }
}

impl From<i64> for EntityKey {
    fn from(key: i64) -> Self {
        EntityKey(key.to_string())
    }
}

// =============================================================================
// Entity State
// =============================================================================

/// Lifecycle state of an entity relative to the entity manager's cache.
///
/// ## State Machine
/// ```text
///  Detached ──add──► Added ──commit──► Unchanged ◄──commit/rollback── Modified
///     ▲                │                  │  ▲                            ▲
///     │             rollback              │  └────────────────────────────┘
///     └────────────────┘                edit
///     ▲                                   │
///     └──commit── Deleted ◄──delete── Unchanged/Modified
///                    └──rollback──► Unchanged
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Matches the last persisted values.
    Unchanged,
    /// Created in this session, never persisted.
    Added,
    /// Persisted entity with pending edits.
    Modified,
    /// Persisted entity marked for deletion.
    Deleted,
    /// Not tracked by any entity manager.
    Detached,
}

impl EntityState {
    /// True for states that belong in the next commit.
    pub const fn is_pending(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }

    pub const fn is_added(&self) -> bool {
        matches!(self, EntityState::Added)
    }

    pub const fn is_modified(&self) -> bool {
        matches!(self, EntityState::Modified)
    }

    pub const fn is_deleted(&self) -> bool {
        matches!(self, EntityState::Deleted)
    }

    pub const fn is_detached(&self) -> bool {
        matches!(self, EntityState::Detached)
    }

    pub const fn is_unchanged(&self) -> bool {
        matches!(self, EntityState::Unchanged)
    }
}

impl Default for EntityState {
    fn default() -> Self {
        EntityState::Detached
    }
}

// =============================================================================
// Fetch Strategy
// =============================================================================

/// Where a query executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Execute against the data service and merge results into the cache.
    FromServer,
    /// Execute only against entities already in the cache.
    FromLocalCache,
}

impl FetchStrategy {
    /// Default strategy for a repository.
    ///
    /// Cached bundles are preloaded reference data and never hit the
    /// network once loaded.
    pub const fn for_bundle(is_cached_bundle: bool) -> Self {
        if is_cached_bundle {
            FetchStrategy::FromLocalCache
        } else {
            FetchStrategy::FromServer
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::FromServer => f.write_str("from_server"),
            FetchStrategy::FromLocalCache => f.write_str("from_local_cache"),
        }
    }
}

// =============================================================================
// Entity Trait
// =============================================================================

/// A persisted object type the entity manager can track.
///
/// Entities travel through the cache as JSON values, so every field
/// name used in a [`Predicate`](crate::Predicate) is the serialized name.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity type name registered in the metadata store.
    const TYPE_NAME: &'static str;

    /// Serialized name of the key property.
    const KEY_PROPERTY: &'static str = "id";

    /// Returns this instance's key.
    fn key(&self) -> EntityKey;

    /// Schema used to register this type.
    fn entity_type() -> EntityType {
        EntityType::new(Self::TYPE_NAME).with_key_property(Self::KEY_PROPERTY)
    }
}

// =============================================================================
// Staffing Resource
// =============================================================================

/// A person available for placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StaffingResource {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub first_name: String,

    #[serde(default)]
    pub middle_name: String,

    pub last_name: String,

    /// Free-form profile summary.
    #[serde(default)]
    pub summary: String,

    /// When the resource was created.
    #[ts(as = "String")]
    pub created: DateTime<Utc>,
}

/// Construction parameters for a new [`StaffingResource`].
///
/// The detail screen fills this from route parameters when the user
/// navigates to "new".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StaffingResourceConfig {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
}

/// Result of the name editor dialog.
pub type StaffingResourceName = StaffingResourceConfig;

impl StaffingResourceConfig {
    /// Validates the name parts.
    ///
    /// ## Rules
    /// - First and last name are required
    /// - Middle name is optional
    pub fn validate(&self) -> ValidationResult<()> {
        validate_person_name("firstName", &self.first_name)?;
        validate_optional_name("middleName", &self.middle_name)?;
        validate_person_name("lastName", &self.last_name)?;
        Ok(())
    }
}

impl StaffingResource {
    /// Builds a new resource from a validated config.
    ///
    /// Names are trimmed. The id must be a UUID.
    pub fn from_config(
        id: impl Into<String>,
        config: &StaffingResourceConfig,
        created: DateTime<Utc>,
    ) -> ValidationResult<Self> {
        let id = id.into();
        validate_key(&id)?;
        config.validate()?;

        Ok(StaffingResource {
            id,
            first_name: config.first_name.trim().to_string(),
            middle_name: config.middle_name.trim().to_string(),
            last_name: config.last_name.trim().to_string(),
            summary: String::new(),
            created,
        })
    }

    /// Applies an edited name after validating it.
    pub fn apply_name(&mut self, name: &StaffingResourceName) -> ValidationResult<()> {
        name.validate()?;
        self.first_name = name.first_name.trim().to_string();
        self.middle_name = name.middle_name.trim().to_string();
        self.last_name = name.last_name.trim().to_string();
        Ok(())
    }

    /// "First Middle Last", skipping an empty middle name.
    pub fn full_name(&self) -> String {
        if self.middle_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            format!("{} {} {}", self.first_name, self.middle_name, self.last_name)
        }
    }
}

impl Entity for StaffingResource {
    const TYPE_NAME: &'static str = "StaffingResource";

    fn key(&self) -> EntityKey {
        EntityKey::new(&self.id)
    }
}

// =============================================================================
// Address / Phone Number
// =============================================================================

/// A postal address of a staffing resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub staffing_resource_id: String,
    pub address_type_id: String,
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    pub city: String,
    pub state_id: String,
    pub zipcode: String,
    #[serde(default)]
    pub primary: bool,
}

impl Entity for Address {
    const TYPE_NAME: &'static str = "Address";

    fn key(&self) -> EntityKey {
        EntityKey::new(&self.id)
    }
}

/// A phone number of a staffing resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumber {
    pub id: String,
    pub staffing_resource_id: String,
    pub phone_number_type_id: String,
    pub area_code: String,
    pub number: String,
    #[serde(default)]
    pub primary: bool,
}

impl Entity for PhoneNumber {
    const TYPE_NAME: &'static str = "PhoneNumber";

    fn key(&self) -> EntityKey {
        EntityKey::new(&self.id)
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// US state (lookup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: String,
    pub short_name: String,
    pub name: String,
}

impl Entity for State {
    const TYPE_NAME: &'static str = "State";

    fn key(&self) -> EntityKey {
        EntityKey::new(&self.id)
    }
}

/// Kind of address, e.g. "Mailing" (lookup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AddressType {
    pub id: String,
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub default: bool,
}

impl Entity for AddressType {
    const TYPE_NAME: &'static str = "AddressType";

    fn key(&self) -> EntityKey {
        EntityKey::new(&self.id)
    }
}

/// Kind of phone number, e.g. "Mobile" (lookup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default: bool,
}

impl Entity for PhoneNumberType {
    const TYPE_NAME: &'static str = "PhoneNumberType";

    fn key(&self) -> EntityKey {
        EntityKey::new(&self.id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
