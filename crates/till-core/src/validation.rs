//! # Validation Module
//!
//! Field-level validators used by [`crate::commands`].
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (serde)                                       │
//! │  └── Shape and enum values (unknown payment method → VALIDATION_ERROR) │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: commands::*Request::validate (THIS MODULE's helpers)         │
//! │  └── Amounts, lengths, ids → typed command                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Domain + database                                            │
//! │  ├── State machines (session open, withdrawal pending)                 │
//! │  └── UNIQUE / FK constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_positive_amount, validate_text};
//!
//! assert!(validate_positive_amount("amountCents", 10_000).is_ok());
//! assert_eq!(validate_text("reason", "  bank run  ", 1, 500).unwrap(), "bank run");
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::MethodAmounts;
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Trims `value` and checks its length in characters.
///
/// ## Rules
/// - `min == 0` allows empty strings, otherwise empty is `Required`
/// - Length is measured after trimming
pub fn validate_text(field: &str, value: &str, min: usize, max: usize) -> ValidationResult<String> {
    let value = value.trim();
    let len = value.chars().count();

    if len == 0 && min > 0 {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if len < min {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min,
        });
    }
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Optional free text: blank becomes `None`.
pub fn validate_optional_text(
    field: &str,
    value: Option<String>,
    max: usize,
) -> ValidationResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) => {
            let v = validate_text(field, &v, 0, max)?;
            Ok(if v.is_empty() { None } else { Some(v) })
        }
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn amount_out_of_range(field: &str, min: i64) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min,
        max: MAX_AMOUNT_CENTS,
    }
}

/// Validates an amount that must be strictly positive.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_AMOUNT_CENTS
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<Money> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(amount_out_of_range(field, 1));
    }
    Ok(Money::from_cents(cents))
}

/// Validates an amount that may be zero.
pub fn validate_non_negative_amount(field: &str, cents: i64) -> ValidationResult<Money> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    if cents > MAX_AMOUNT_CENTS {
        return Err(amount_out_of_range(field, 0));
    }
    Ok(Money::from_cents(cents))
}

/// Sums already-validated amounts, rejecting a total above MAX_AMOUNT_CENTS.
///
/// ## Example
/// ```rust
/// use till_core::money::Money;
/// use till_core::validation::validate_total;
///
/// let amounts = [Money::from_cents(100), Money::from_cents(250)];
/// assert_eq!(validate_total("payments", amounts).unwrap().cents(), 350);
/// ```
pub fn validate_total(
    field: &str,
    amounts: impl IntoIterator<Item = Money>,
) -> ValidationResult<Money> {
    Money::checked_sum(amounts)
        .filter(|total| total.cents() <= MAX_AMOUNT_CENTS)
        .ok_or_else(|| amount_out_of_range(field, 0))
}

/// Validates a per-method amount set (every method ≥ 0).
pub fn validate_method_amounts(field: &str, amounts: &MethodAmounts) -> ValidationResult<()> {
    for (method, amount) in amounts.iter() {
        validate_non_negative_amount(&format!("{}.{:?}", field, method), amount.cents())?;
    }
    validate_total(field, amounts.iter().map(|(_, amount)| amount))?;
    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string and returns it trimmed.
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_id;
///
/// assert!(validate_id("saleId", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_id("saleId", "not-a-uuid").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(id.to_string())
}

/// Validates an optional id.
pub fn validate_optional_id(field: &str, id: Option<String>) -> ValidationResult<Option<String>> {
    id.map(|id| validate_id(field, &id)).transpose()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_text("reason", " short ", 5, 10).unwrap(), "short");
        assert!(matches!(
            validate_text("reason", "   ", 1, 10),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_text("reason", "abcd", 5, 10),
            Err(ValidationError::TooShort { min: 5, .. })
        ));
        assert!(matches!(
            validate_text("reason", &"x".repeat(11), 1, 10),
            Err(ValidationError::TooLong { max: 10, .. })
        ));
    }

    #[test]
    fn test_validate_optional_text_blank_is_none() {
        assert_eq!(validate_optional_text("notes", Some("  ".into()), 10).unwrap(), None);
        assert_eq!(
            validate_optional_text("notes", Some(" ok ".into()), 10).unwrap(),
            Some("ok".to_string())
        );
        assert_eq!(validate_optional_text("notes", None, 10).unwrap(), None);
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_positive_amount("amount", 1).is_ok());
        assert!(validate_positive_amount("amount", 0).is_err());
        assert!(validate_positive_amount("amount", -1).is_err());

        assert!(validate_non_negative_amount("amount", 0).is_ok());
        assert!(validate_non_negative_amount("amount", -1).is_err());

        assert!(validate_positive_amount("amount", MAX_AMOUNT_CENTS).is_ok());
        assert!(matches!(
            validate_positive_amount("amount", i64::MAX),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT_CENTS, .. })
        ));
        assert!(validate_non_negative_amount("amount", MAX_AMOUNT_CENTS + 1).is_err());
    }

    #[test]
    fn test_validate_total_rejects_overflow_and_cap() {
        let half = Money::from_cents(MAX_AMOUNT_CENTS / 2);
        assert_eq!(validate_total("payments", [half, half]).unwrap(), half + half);

        assert!(validate_total("payments", [half, half, Money::from_cents(MAX_AMOUNT_CENTS)]).is_err());
        assert!(matches!(
            validate_total("items", [Money::from_cents(i64::MAX), Money::from_cents(1)]),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_method_amounts() {
        let ok = MethodAmounts {
            cash_cents: 100,
            ..Default::default()
        };
        assert!(validate_method_amounts("declared", &ok).is_ok());

        let bad = MethodAmounts {
            debit_cents: -1,
            ..Default::default()
        };
        assert!(validate_method_amounts("declared", &bad).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_id("id", "").is_err());
        assert!(validate_id("id", "123").is_err());
        assert_eq!(validate_optional_id("id", None).unwrap(), None);
    }
}
