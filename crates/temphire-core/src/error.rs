//! # Error Types
//!
//! Domain-specific error types for temphire-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  temphire-core errors (this file)                                      │
//! │  ├── CoreError        - Metadata registry failures                     │
//! │  └── ValidationError  - Entity construction input failures             │
//! │                                                                         │
//! │  temphire-db errors (separate crate)                                   │
//! │  └── DbError          - Manager, repository and persistence failures   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → UI collaborator         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised by the pure entity model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No entity type with this name is registered in the metadata store.
    ///
    /// ## When This Occurs
    /// - A repository was created for a type nobody registered
    /// - A typo in an entity type name
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary where typed construction parameters
/// (e.g. a new staffing resource's name) become entities.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
