//! # temphire-core: Entity Model for the TempHire Data Layer
//!
//! This crate holds everything the data layer needs that does not touch
//! I/O: entity identity and lifecycle, the TempHire entity structs,
//! predicates, the metadata registry and input validation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TempHire Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              UI (resource detail screen, external)              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ repositories + unit of work           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          temphire-db: EntityManager, Repository, UoW            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ temphire-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ predicate │  │ metadata  │  │ validation│  │   │
//! │  │   │ Entity    │  │ Predicate │  │ EntityType│  │   rules   │  │   │
//! │  │   │ EntityKey │  │ CompareOp │  │ Metadata  │  │           │  │   │
//! │  │   │ State     │  │           │  │ Store     │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity trait, keys, lifecycle states, TempHire entities
//! - [`predicate`] - Composable filter expressions
//! - [`metadata`] - Entity types and resource-name bindings
//! - [`validation`] - Construction parameter validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use temphire_core::{MetadataStore, Predicate, StaffingResource};
//! use serde_json::json;
//!
//! let metadata = MetadataStore::new();
//! metadata.register::<StaffingResource>();
//! metadata.bind_resource_name("StaffingResource", "StaffingResources").unwrap();
//!
//! let smiths = Predicate::eq("lastName", "Smith") & Predicate::starts_with("firstName", "j");
//! assert!(smiths.matches(&json!({ "firstName": "Jane", "lastName": "Smith" })));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod metadata;
pub mod predicate;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use metadata::{EntityType, MetadataStore};
pub use predicate::{CompareOp, ComparePredicate, Predicate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a single name part (first, middle or last name).
pub const MAX_NAME_LENGTH: usize = 50;

/// Resource name of staffing resources.
pub const STAFFING_RESOURCES: &str = "StaffingResources";

/// Resource name of addresses.
pub const ADDRESSES: &str = "Addresses";

/// Resource name of phone numbers.
pub const PHONE_NUMBERS: &str = "PhoneNumbers";

/// Resource name the lookup bundle is published under.
///
/// Lookup repositories are cached bundles, so their queries address the
/// entity type name; this name is what the bundle is known as remotely.
pub const LOOKUPS_RESOURCE: &str = "Lookups";
