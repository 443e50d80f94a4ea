//! # Data Layer Error Types
//!
//! Error types for entity manager, repository and persistence operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error) / remote status                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Fetched::{Found | NotFound | Failure(DbError)}  ← data service         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Repository: NotFound → None / []   Failure → Err(DbError) unchanged   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI collaborator decides what the user sees                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Not-found is deliberately absent from [`DbError`]: it is an expected
//! outcome carried by [`Fetched::NotFound`](crate::Fetched::NotFound).

use temphire_core::{CoreError, ValidationError};
use thiserror::Error;

/// Data layer errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Programmer error in how a component was constructed.
    ///
    /// ## When This Occurs
    /// - `with_id` on a repository created without an entity type name
    #[error("{0}")]
    Configuration(String),

    /// Entity type is not registered in the metadata store.
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Operation needs an entity the manager is not tracking.
    #[error("{entity_type} {key} is not tracked by this entity manager")]
    NotTracked { entity_type: String, key: String },

    /// Lifecycle transition is not allowed from the current state.
    ///
    /// ## When This Occurs
    /// - Editing an entity that is marked deleted
    /// - Adding an entity whose key is already tracked
    #[error("{entity_type} {key}: {message}")]
    InvalidState {
        entity_type: String,
        key: String,
        message: String,
    },

    /// Construction parameters failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Entity could not be (de)serialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A remote data service answered with a failure status.
    #[error("Remote request failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// The configuration error raised by key lookups on untyped repositories.
    pub fn missing_entity_type() -> Self {
        DbError::Configuration("Repository must be created with an entity type specified".to_string())
    }

    /// Creates a NotTracked error.
    pub fn not_tracked(entity_type: impl Into<String>, key: impl ToString) -> Self {
        DbError::NotTracked {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity_type: impl Into<String>,
        key: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        DbError::InvalidState {
            entity_type: entity_type.into(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Creates a Remote error.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        DbError::Remote {
            status,
            message: message.into(),
        }
    }

    /// True for programmer errors that should never be caught and retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DbError::Configuration(_) | DbError::UnknownEntityType(_))
    }
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownEntityType(name) => DbError::UnknownEntityType(name),
            CoreError::Validation(e) => DbError::Validation(e),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for data layer operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entity_type_message() {
        let err = DbError::missing_entity_type();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Repository must be created with an entity type specified"
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let err: DbError = CoreError::UnknownEntityType("Person".to_string()).into();
        assert!(matches!(err, DbError::UnknownEntityType(ref name) if name == "Person"));
        assert!(err.is_configuration());

        let err: DbError = ValidationError::Required {
            field: "firstName".to_string(),
        }
        .into();
        assert!(matches!(err, DbError::Validation(_)));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_remote_message() {
        assert_eq!(
            DbError::remote(500, "boom").to_string(),
            "Remote request failed with status 500: boom"
        );
    }
}
