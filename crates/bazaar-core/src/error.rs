//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── ValidationError  - Bad input, rejected before any mutation        │
//! │  ├── CouponRejection  - One reason code per coupon rule                │
//! │  └── CoreError        - Business rule violations                       │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  ├── DbError          - Not-found, conflicts, sqlx failures            │
//! │  └── ServiceError     - Core + Db + external (gateway) failures        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, amounts, limits)
//! 3. Errors are enum variants, never String
//! 4. Insufficient funds, not-found, and conflicts stay distinguishable

use thiserror::Error;

use crate::types::{OrderItemStatus, OrderStatus, ReturnStatus};

// =============================================================================
// Coupon Rejection
// =============================================================================

/// Why a coupon did not apply.
///
/// Evaluation short-circuits on the first failing rule, so exactly one
/// reason code comes back. These are user-facing reasons, safe to retry
/// after correcting the cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    /// No active coupon with that code (case-insensitive match).
    #[error("Invalid coupon code")]
    InvalidCoupon,

    /// Outside the validity window (date-only, inclusive both ends).
    #[error("Coupon has expired or is not yet valid")]
    Expired,

    /// Nothing orderable in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart subtotal below the coupon's minimum.
    #[error("Cart value below the coupon minimum of {min_paise} paise")]
    BelowMinimum { min_paise: i64 },

    /// No cart line matches the coupon's subcategory restriction.
    #[error("Coupon does not apply to any item in the cart")]
    CategoryMismatch,

    /// Per-user redemption cap reached.
    #[error("Coupon usage limit reached ({limit} per user)")]
    LimitReached { limit: i64 },
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. None of them is raised
/// after a partial mutation - callers reject before touching state, or
/// roll the whole transaction back.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Stock check failed under the reservation guard.
    ///
    /// ## When This Occurs
    /// - Two users checkout the same low-stock variant concurrently
    /// - Cart was built before the stock ran out
    ///
    /// Callers may retry or surface "no longer available".
    #[error("Insufficient stock for variant {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// Wallet debit would overdraw the balance.
    #[error("Insufficient wallet balance: have {balance_paise}, need {required_paise}")]
    InsufficientFunds {
        balance_paise: i64,
        required_paise: i64,
    },

    /// Checkout with nothing orderable in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cash on delivery is capped.
    #[error("Cash on delivery not allowed for {total_paise} paise (limit {limit_paise})")]
    CodLimitExceeded { total_paise: i64, limit_paise: i64 },

    /// Operator asked for an order transition the state machine forbids.
    #[error("Order cannot move from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    /// The order's state forbids cancelling items.
    #[error("Order is {status:?}; items can no longer be cancelled")]
    OrderNotCancellable { status: OrderStatus },

    /// The item was already cancelled (idempotent retries land here).
    #[error("Order item {item_id} is already cancelled")]
    ItemAlreadyCancelled { item_id: String },

    /// Return requested on an order that was never delivered.
    #[error("Order is {status:?}; returns require a delivered order")]
    OrderNotDelivered { status: OrderStatus },

    /// Return requested after the return window closed.
    #[error("Return window of {window_days} days has expired")]
    ReturnWindowExpired { window_days: i64 },

    /// A return request already exists for this item.
    #[error("A return request already exists for item {item_id}")]
    DuplicateReturnRequest { item_id: String },

    /// Return requested for an item that cannot be returned.
    #[error("Order item is {status:?} and cannot be returned")]
    ItemNotReturnable { status: OrderItemStatus },

    /// Return workflow transition the state machine forbids.
    #[error("Return request cannot move from {from:?} to {to:?}")]
    InvalidReturnTransition { from: ReturnStatus, to: ReturnStatus },

    /// Coupon rule evaluation failed.
    #[error("Coupon rejected: {0}")]
    Coupon(#[from] CouponRejection),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Rejected before any business logic runs; no partial state exists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Too many attachments.
    #[error("{field} allows at most {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            variant_id: "v-42".to_string(),
            available: 1,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for variant v-42: available 1, requested 3"
        );
    }

    #[test]
    fn test_coupon_rejection_converts_to_core_error() {
        let rejection = CouponRejection::BelowMinimum { min_paise: 50_000 };
        let core: CoreError = rejection.into();
        assert!(matches!(
            core,
            CoreError::Coupon(CouponRejection::BelowMinimum { min_paise: 50_000 })
        ));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core: CoreError = validation.into();
        assert!(matches!(core, CoreError::Validation(_)));
    }
}
