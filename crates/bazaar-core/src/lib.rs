//! # bazaar-core: Pure Business Logic for the Bazaar Order Engine
//!
//! This crate is the **heart** of the order pricing and
//! fulfillment-lifecycle engine. It contains all business logic as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bazaar Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Storefront / Admin (external, out of scope)              │   │
//! │  │    add-to-cart ─► apply-coupon ─► place-order ─► cancel/return │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │  pricing  │  │  coupon   │  │ lifecycle │  │   │
//! │  │   │  paise    │  │  totals   │  │  rules    │  │ + returns │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  │        SQLite repositories, transactional services              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Coupon, Wallet, ReturnRequest, ...)
//! - [`money`] - Money type with integer paise arithmetic (no floats!)
//! - [`pricing`] - Effective prices, cart totals, GST, delivery charge
//! - [`coupon`] - Stateless coupon rule evaluation
//! - [`lifecycle`] - Order state machine and post-cancellation recomputation
//! - [`returns`] - Return window, refund amount, return state machine
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output; `now`/`today` are
//!    always parameters, never read from a clock here
//! 2. **No I/O**: database, network, file system access is FORBIDDEN
//! 3. **Integer Money**: all monetary values are paise (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coupon;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod returns;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use bazaar_core::Money` instead of
// `use bazaar_core::money::Money`

pub use error::{CoreError, CoreResult, CouponRejection, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Flat GST rate in basis points (18%).
///
/// ## Why a constant?
/// The engine runs a single flat-rate jurisdiction; multi-jurisdiction
/// tax is an explicit non-goal. Pricing still threads it through
/// [`types::TaxRate`] so nothing else hard-codes the number.
pub const GST_RATE_BPS: u32 = 1800;

/// Carts at or above this taxable amount ship free (₹1000).
pub const FREE_DELIVERY_THRESHOLD_PAISE: i64 = 100_000;

/// Flat delivery fee below the free-shipping threshold (₹100).
pub const DELIVERY_CHARGE_PAISE: i64 = 10_000;

/// Cash-on-delivery ceiling (₹5000). Orders at or above this must be
/// prepaid.
pub const COD_LIMIT_PAISE: i64 = 500_000;

/// Maximum quantity of a single variant per cart line.
///
/// ## Business Reason
/// Retail cap against reseller sweeps; the cart clamps to
/// `min(requested, stock, 4)` rather than erroring.
pub const MAX_ITEM_QUANTITY: i64 = 4;

/// Days after delivery during which an item can be returned.
pub const RETURN_WINDOW_DAYS: i64 = 10;

/// Maximum image attachments on a return request.
pub const MAX_RETURN_IMAGES: usize = 3;
