//! # Metadata Store
//!
//! Shared registry of entity types and the resource names that map to them.
//!
//! ## Why Resource Names Need Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Resource Name → Entity Type                             │
//! │                                                                         │
//! │  Query targets "StaffingResources"    (wire-level collection name)     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MetadataStore.resources["StaffingResources"] ──► "StaffingResource"   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EntityType { name, key_property: "id", default_resource_name }        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Entity manager can key, cache and merge the payloads it receives      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sharing
//! One store is shared (behind `Arc`) by every entity manager created from
//! the same provider, so a binding made by one repository is visible to all
//! sessions. All operations are idempotent.

use std::collections::HashMap;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::types::{Entity, EntityKey};

// =============================================================================
// Entity Type
// =============================================================================

/// Schema of one kind of persisted object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    /// Logical type name, e.g. "StaffingResource".
    pub name: String,

    /// Serialized name of the key property.
    pub key_property: String,

    /// Resource name used when none is given explicitly.
    pub default_resource_name: Option<String>,
}

impl EntityType {
    /// Creates a type keyed by `id`.
    pub fn new(name: impl Into<String>) -> Self {
        EntityType {
            name: name.into(),
            key_property: "id".to_string(),
            default_resource_name: None,
        }
    }

    /// Sets the key property.
    pub fn with_key_property(mut self, key_property: impl Into<String>) -> Self {
        self.key_property = key_property.into();
        self
    }

    /// Sets the default resource name.
    pub fn with_default_resource_name(mut self, resource_name: impl Into<String>) -> Self {
        self.default_resource_name = Some(resource_name.into());
        self
    }

    /// Reads the key out of a serialized entity of this type.
    pub fn key_of(&self, value: &Value) -> Option<EntityKey> {
        value.get(&self.key_property).and_then(EntityKey::from_value)
    }

    /// Resource name the data service should use for this type.
    pub fn resource_name(&self) -> &str {
        self.default_resource_name.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// Metadata Store
// =============================================================================

#[derive(Debug, Default)]
struct Registry {
    types: HashMap<String, EntityType>,
    resources: HashMap<String, String>,
}

/// Registry of entity types and resource-name bindings.
#[derive(Debug, Default)]
pub struct MetadataStore {
    inner: RwLock<Registry>,
}

impl MetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MetadataStore::default()
    }

    /// Registers (or replaces) an entity type schema.
    ///
    /// An existing default resource name survives re-registration, and
    /// the type's own default resource name is mapped if it has one.
    pub fn register_entity_type(&self, entity_type: EntityType) {
        let mut registry = self.inner.write();

        let mut entity_type = entity_type;
        if entity_type.default_resource_name.is_none() {
            if let Some(existing) = registry.types.get(&entity_type.name) {
                entity_type.default_resource_name = existing.default_resource_name.clone();
            }
        }

        if let Some(resource) = entity_type.default_resource_name.clone() {
            registry.resources.insert(resource, entity_type.name.clone());
        }
        registry.types.insert(entity_type.name.clone(), entity_type);
    }

    /// Registers the schema of a Rust entity type.
    pub fn register<T: Entity>(&self) {
        self.register_entity_type(T::entity_type());
    }

    /// Looks up an entity type by name.
    ///
    /// With `create_if_missing`, an unknown name is registered as a bare
    /// type keyed by `id` and returned.
    pub fn get_entity_type(&self, name: &str, create_if_missing: bool) -> Option<EntityType> {
        if let Some(found) = self.inner.read().types.get(name) {
            return Some(found.clone());
        }

        if !create_if_missing || name.is_empty() {
            return None;
        }

        let mut registry = self.inner.write();
        let entity_type = registry
            .types
            .entry(name.to_string())
            .or_insert_with(|| EntityType::new(name));
        Some(entity_type.clone())
    }

    /// Sets an entity type's default resource name.
    pub fn set_default_resource_name(&self, type_name: &str, resource_name: &str) -> CoreResult<()> {
        let mut registry = self.inner.write();
        let entity_type = registry
            .types
            .get_mut(type_name)
            .ok_or_else(|| CoreError::UnknownEntityType(type_name.to_string()))?;

        entity_type.default_resource_name = Some(resource_name.to_string());
        Ok(())
    }

    /// Maps a resource name to an entity type.
    pub fn set_entity_type_for_resource_name(
        &self,
        resource_name: &str,
        type_name: &str,
    ) -> CoreResult<()> {
        let mut registry = self.inner.write();
        if !registry.types.contains_key(type_name) {
            return Err(CoreError::UnknownEntityType(type_name.to_string()));
        }

        registry
            .resources
            .insert(resource_name.to_string(), type_name.to_string());
        Ok(())
    }

    /// Performs both halves of a repository's resource binding under one
    /// write lock: default resource name plus resource → type mapping.
    ///
    /// Returns the updated entity type.
    pub fn bind_resource_name(&self, type_name: &str, resource_name: &str) -> CoreResult<EntityType> {
        let mut registry = self.inner.write();
        let entity_type = registry
            .types
            .get_mut(type_name)
            .ok_or_else(|| CoreError::UnknownEntityType(type_name.to_string()))?;

        entity_type.default_resource_name = Some(resource_name.to_string());
        let bound = entity_type.clone();

        registry
            .resources
            .insert(resource_name.to_string(), type_name.to_string());
        Ok(bound)
    }

    /// Resolves the entity type a resource name maps to.
    ///
    /// A resource named exactly like a registered type resolves to that
    /// type even without an explicit mapping.
    pub fn entity_type_for_resource_name(&self, resource_name: &str) -> Option<EntityType> {
        let registry = self.inner.read();
        registry
            .resources
            .get(resource_name)
            .map(String::as_str)
            .or(Some(resource_name))
            .and_then(|type_name| registry.types.get(type_name))
            .cloned()
    }

    /// Names of all registered entity types, sorted.
    pub fn entity_type_names(&self) -> Vec<String> {
        let registry = self.inner.read();
        let mut names: Vec<String> = registry.types.keys().cloned().collect();
        names.sort();
        names
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
