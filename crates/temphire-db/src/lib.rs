//! # temphire-db: Data Access Layer for TempHire
//!
//! Entity manager, repositories and units of work for the TempHire
//! resource management screens, with a SQLite-backed data service.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TempHire Data Flow                               │
//! │                                                                         │
//! │  Resource detail screen (external)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   temphire-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  Repository   │    │ EntityManager │    │ DataService  │  │   │
//! │  │   │  UnitOfWork   │───►│ cache +       │───►│ (trait)      │  │   │
//! │  │   │  ResourceMgt  │    │ change        │    │ SqliteData-  │  │   │
//! │  │   │  UnitOfWork   │    │ tracking      │    │ Service      │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────┬───────┘  │   │
//! │  │                                                    │          │   │
//! │  └────────────────────────────────────────────────────┼──────────┘   │
//! │                                                       ▼              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          SQLite (pool.rs + embedded migrations)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`repository`] - `Repository<T>`, `UnitOfWork`, `ResourceMgtUnitOfWork`
//! - [`manager`] - `EntityManager` and `EntityManagerProvider`
//! - [`data_service`] - The remote seam and its SQLite implementation
//! - [`query`] - `EntityQuery`
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Data layer error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use temphire_db::{Database, DbConfig, ResourceMgtUnitOfWork};
//!
//! let db = Database::new(DbConfig::from_env()).await?;
//! let provider = db.entity_manager_provider();
//! provider.prepare().await?;
//!
//! let uow = ResourceMgtUnitOfWork::from_provider(&provider);
//! let resource = uow.staffing_resources().with_id(id)?.await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod data_service;
pub mod error;
pub mod manager;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use data_service::{DataService, EntityChange, Fetched, SaveBundle, SqliteDataService};
pub use error::{DbError, DbResult};
pub use manager::{EntityManager, EntityManagerProvider};
pub use pool::{Database, DbConfig};
pub use query::EntityQuery;
pub use repository::{Repository, ResourceMgtUnitOfWork, StaffingResourceFactory, UnitOfWork};
