//! # Validation Module
//!
//! Input validation for entity construction parameters.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI form (name editor dialog)                                 │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Factory / apply_name (Rust)                                  │
//! │  └── THIS MODULE: typed config → validated entity                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage                                                      │
//! │  └── Primary key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use temphire_core::validation::{validate_person_name, validate_key};
//!
//! assert!(validate_person_name("firstName", "Ada").is_ok());
//! assert!(validate_key("550e8400-e29b-41d4-a716-446655440000").is_ok());
//! ```

use crate::error::ValidationError;
use crate::MAX_NAME_LENGTH;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Name Validators
// =============================================================================

/// Validates a required name part (first or last name).
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most [`MAX_NAME_LENGTH`] characters
pub fn validate_person_name(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    validate_optional_name(field, value)
}

/// Validates an optional name part (middle name). Empty is allowed.
pub fn validate_optional_name(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

// =============================================================================
// Key Validators
// =============================================================================

/// Validates a UUID entity key.
///
/// ## Rules
/// - Must not be empty
/// - Must parse as a UUID
///
/// ## Example
/// ```rust
/// use temphire_core::validation::validate_key;
///
/// assert!(validate_key("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_key("not-a-uuid").is_err());
/// ```
pub fn validate_key(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_person_name() {
        assert!(validate_person_name("firstName", "Ada").is_ok());
        assert!(validate_person_name("firstName", "").is_err());
        assert!(validate_person_name("firstName", "   ").is_err());
        assert!(validate_person_name("firstName", &"A".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_optional_name() {
        assert!(validate_optional_name("middleName", "").is_ok());
        assert!(validate_optional_name("middleName", "B.").is_ok());
        assert!(validate_optional_name("middleName", &"B".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("42").is_err());
    }
}
