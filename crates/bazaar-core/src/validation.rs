//! # Validation Module
//!
//! Input validation for the order engine. Runs before any business
//! logic, so a rejection here never leaves partial state behind.

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;
use crate::MAX_RETURN_IMAGES;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a cart/order quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (4)
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(5).is_err());
/// ```
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

/// Validates a monetary amount that must be strictly positive
/// (wallet credits/debits, top-ups).
pub fn validate_positive_amount(paise: i64) -> ValidationResult<()> {
    if paise <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Validates a free-text reason (cancellation, return).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Maximum 255 characters
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > 255 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 255,
        });
    }

    Ok(())
}

/// Validates the image attachments on a return request (0..=3).
pub fn validate_return_images(images: &[String]) -> ValidationResult<()> {
    if images.len() > MAX_RETURN_IMAGES {
        return Err(ValidationError::TooMany {
            field: "images".to_string(),
            max: MAX_RETURN_IMAGES,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(4).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-2).is_err());
        assert!(validate_quantity(5).is_err());
    }

    #[test]
    fn test_positive_amount() {
        assert!(validate_positive_amount(1).is_ok());
        assert!(validate_positive_amount(0).is_err());
        assert!(validate_positive_amount(-100).is_err());
    }

    #[test]
    fn test_reason() {
        assert!(validate_reason("wrong size").is_ok());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(300)).is_err());
    }

    #[test]
    fn test_return_images() {
        let three: Vec<String> = (0..3).map(|i| format!("img{i}.jpg")).collect();
        assert!(validate_return_images(&three).is_ok());
        let four: Vec<String> = (0..4).map(|i| format!("img{i}.jpg")).collect();
        assert!(validate_return_images(&four).is_err());
    }
}
