//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Domain failures (taxonomy codes below)         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  till-api errors (in app)                                              │
//! │  └── ApiError         - What HTTP clients see (envelope)               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! | Variant              | Code              |
//! |----------------------|-------------------|
//! | `Validation`         | VALIDATION_ERROR  |
//! | `NotFound`           | NOT_FOUND         |
//! | `Conflict`           | CONFLICT          |
//! | `PreconditionFailed` | BAD_REQUEST       |
//! | `AmountMismatch`     | AMOUNT_MISMATCH   |
//! | `Forbidden`          | FORBIDDEN         |

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity is missing or not owned by the calling tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Uniqueness or state violation.
    ///
    /// ## When This Occurs
    /// - Opening a second session on a point of sale
    /// - Confirming/rejecting an already resolved withdrawal
    /// - Losing a compare-and-set race to a concurrent writer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The entity exists but is not in a state that allows the operation.
    ///
    /// ## When This Occurs
    /// - Recording a sale or movement on a CLOSED session
    /// - Refunding a REFUNDED or CANCELLED sale
    /// - Refunding more units than remain refundable
    #[error("{0}")]
    PreconditionFailed(String),

    /// Financial totals differ by more than the tolerance.
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: Money, actual: Money },

    /// Operation touches a protected entity or needs a role the caller lacks.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict(message.into())
    }

    /// Creates a PreconditionFailed error.
    pub fn precondition(message: impl Into<String>) -> Self {
        CoreError::PreconditionFailed(message.into())
    }

    /// Machine-readable taxonomy code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::PreconditionFailed(_) => "BAD_REQUEST",
            CoreError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the command layer before any domain logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value inside one request.
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
