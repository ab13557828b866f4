//! # Domain Types
//!
//! Core domain types for the Bazaar order engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CatalogProduct  │   │     Order       │   │     Wallet      │       │
//! │  │ ProductVariant  │──►│   OrderItem     │──►│ WalletTxn (log) │       │
//! │  │ Offer           │   │   (frozen ₹)    │   │   (append-only) │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CartLine        │   │    Coupon       │   │  ReturnRequest  │       │
//! │  │ (ephemeral)     │   │  CouponUsage    │   │  (latched)      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: `order_code`, coupon `code` -
//!   human-readable, URL-safe
//!
//! ## Monetary Fields
//! All money is stored as `*_paise: i64` columns; accessors convert to
//! [`Money`]. No entity ever carries a float.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1800 bps = 18% (flat GST rate for the storefront)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Catalog (read-mostly: owned by the catalog, consumed by pricing)
// =============================================================================

/// A product as the pricing engine sees it.
///
/// The catalog owns the full product record; this engine only reads the
/// fields pricing and coupon category checks need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CatalogProduct {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name, snapshotted onto order items at purchase.
    pub name: String,

    /// Catalog price in paise, before any promotional offer.
    pub price_paise: i64,

    /// Subcategory used by category-scoped offers and coupons.
    pub subcategory_id: Option<String>,

    /// Whether the product is live (soft delete).
    pub is_active: bool,
}

impl CatalogProduct {
    /// Returns the catalog price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_paise(self.price_paise)
    }
}

/// A specific size/SKU of a product - the unit of stock tracking.
///
/// ## Invariant
/// `stock` is never negative. The database layer enforces this with a
/// guarded decrement; this type just carries the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    /// Size label ("8", "9", "10" ...).
    pub size: String,
    /// Current stock level (>= 0).
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What an [`Offer`] applies to.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferScope {
    /// Applies to one product.
    Product,
    /// Applies to every product in a subcategory.
    Category,
}

/// A promotional percentage offer.
///
/// The best applicable offer (largest percentage) reduces the catalog
/// price to the effective unit price. Ties resolve to the smallest
/// offer id so pricing stays deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Offer {
    pub id: String,
    pub scope: OfferScope,
    /// Product id or subcategory id, per `scope`.
    pub target_id: String,
    /// Discount percentage in basis points (1000 = 10%).
    pub percent_bps: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Offer {
    /// Whether the offer is live at `now`.
    pub fn applies_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A line in a user's cart.
///
/// Ephemeral: created on add-to-cart, destroyed on order placement or
/// explicit removal. Never survives past checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: String,
    pub user_id: String,
    pub variant_id: String,
    /// Requested quantity; pricing clamps to `min(quantity, stock, 4)`.
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

/// A cart line joined with the catalog data pricing needs.
///
/// Built by the cart repository in one query so the pricing engine
/// stays pure (no lookups of its own).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLineView {
    pub variant_id: String,
    pub product_id: String,
    pub product_name: String,
    pub subcategory_id: Option<String>,
    pub quantity: i64,
    /// Catalog price in paise (before offers).
    pub price_paise: i64,
    pub stock: i64,
    pub product_active: bool,
    pub variant_active: bool,
}

impl CartLineView {
    /// Whether this line counts toward totals at all.
    pub fn is_orderable(&self) -> bool {
        self.product_active && self.variant_active && self.stock > 0
    }
}

// =============================================================================
// Coupons
// =============================================================================

/// How a coupon's `discount_value` is interpreted.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `discount_value` is a percentage in basis points (1000 = 10%).
    Percent,
    /// `discount_value` is a flat amount in paise.
    Flat,
}

/// A discount coupon.
///
/// Immutable once applied to an order: the order stores a denormalized
/// snapshot (coupon id + code + computed discount), so later coupon
/// edits never retroactively change historical orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: String,
    /// Display label ("Festive 10").
    pub name: String,
    /// Unique redemption code; matched case-insensitively.
    pub code: String,
    pub discount_kind: DiscountKind,
    /// Percent: basis points. Flat: paise.
    pub discount_value: i64,
    /// Minimum cart subtotal (paise) for the coupon to apply.
    pub min_cart_value_paise: i64,
    /// Maximum successful redemptions per user.
    pub per_user_limit: i64,
    /// If set, at least one cart line's product must be in this subcategory.
    pub subcategory_id: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_till: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Returns the minimum cart value as Money.
    #[inline]
    pub fn min_cart_value(&self) -> Money {
        Money::from_paise(self.min_cart_value_paise)
    }
}

/// Per-(user, coupon) redemption counter.
///
/// Incremented exactly once per successfully placed order that used the
/// coupon; decremented (floor 0) when that order is fully cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CouponUsage {
    pub id: String,
    pub user_id: String,
    pub coupon_id: String,
    pub used_count: i64,
}

// =============================================================================
// Orders
// =============================================================================

/// The status of an order.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed but not yet paid/acknowledged (COD starts here).
    Pending,
    /// Paid and being prepared.
    Processing,
    /// Handed to the courier.
    Shipped,
    /// Terminal success; opens the 10-day return window.
    Delivered,
    /// Terminal failure.
    Cancelled,
}

impl OrderStatus {
    /// Terminal states accept no further order-level transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// The status of a single order line, independent of (but constrained
/// by) the parent order's status.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderItemStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
}

/// How the order was (or will be) paid.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Debited from the user's wallet at placement.
    Wallet,
    /// Cash on delivery; allowed only below the COD ceiling.
    Cod,
    /// External payment gateway; order created after verification.
    Gateway,
}

impl PaymentMethod {
    /// Whether money changed hands before delivery.
    ///
    /// Prepaid orders receive wallet credits on cancellation; COD
    /// orders do not (nothing was collected).
    pub fn is_prepaid(&self) -> bool {
        matches!(self, PaymentMethod::Wallet | PaymentMethod::Gateway)
    }
}

/// An order.
///
/// Created atomically with its items; thereafter mutated only by the
/// fulfillment service. Totals always satisfy
/// `total = (subtotal - discount) + gst + delivery`, floored at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    /// Public opaque code (URL-safe, unique), shown to the customer.
    pub order_code: String,
    pub user_id: String,
    pub address_id: String,
    pub subtotal_paise: i64,
    pub discount_paise: i64,
    pub gst_paise: i64,
    pub delivery_paise: i64,
    pub total_paise: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    /// Snapshot of the applied coupon, if any.
    pub coupon_id: Option<String>,
    pub coupon_code: Option<String>,
    pub cancel_reason: Option<String>,
    /// Stamped on transition to Delivered; cleared if the status is
    /// corrected away from Delivered.
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_paise(self.subtotal_paise)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_paise(self.discount_paise)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

/// A line item on an order.
///
/// Uses the snapshot pattern: `unit_price_paise` and `product_name` are
/// frozen at placement time and never recomputed from the live catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub variant_id: String,
    /// Product name at time of purchase (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Effective unit price in paise at time of purchase (frozen).
    pub unit_price_paise: i64,
    pub status: OrderItemStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the frozen unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_paise(self.unit_price_paise)
    }

    /// Line total at the frozen price.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }

    /// Whether the line still contributes to order totals.
    pub fn is_live(&self) -> bool {
        self.status != OrderItemStatus::Cancelled
    }
}

// =============================================================================
// Wallet Ledger
// =============================================================================

/// A user's wallet.
///
/// `balance_paise` is a cache of the transaction ledger - it is never
/// mutated except through the wallet ledger's credit/debit, which append
/// a [`WalletTransaction`] in the same database transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    /// Cached balance (>= 0), re-derivable by ledger replay.
    pub balance_paise: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_paise(self.balance_paise)
    }
}

/// Direction of a wallet transaction.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// One append-only row in the wallet ledger.
///
/// ## Invariant
/// For any wallet, `balance_after` of row *n* equals `balance_before`
/// of row *n+1*, and the latest `balance_after` equals the cached
/// `Wallet::balance_paise`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WalletTransaction {
    pub id: String,
    pub wallet_id: String,
    /// Always positive; `kind` carries the sign.
    pub amount_paise: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub balance_before_paise: i64,
    pub balance_after_paise: i64,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Signed delta this row applies to the balance.
    pub fn signed_delta_paise(&self) -> i64 {
        match self.kind {
            TransactionKind::Credit => self.amount_paise,
            TransactionKind::Debit => -self.amount_paise,
        }
    }
}

// =============================================================================
// Returns
// =============================================================================

/// The status of a return request.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Requested,
    Approved,
    PickupScheduled,
    PickedUp,
    RefundInitiated,
    /// Terminal: wallet credited and stock restored (exactly once).
    Refunded,
    /// Terminal: reachable from any pre-Refunded state.
    Declined,
}

/// A post-delivery return request for a single order item.
///
/// One request per item, enforced by a unique index on `order_item_id`.
/// `refund_amount_paise` is computed once at creation and never
/// recalculated. `stock_restored` is a one-shot latch: stock is
/// incremented and the wallet credited exactly once, the first time the
/// request transitions to Refunded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReturnRequest {
    pub id: String,
    pub order_item_id: String,
    pub user_id: String,
    pub reason: String,
    pub comments: Option<String>,
    pub image1: Option<String>,
    pub image2: Option<String>,
    pub image3: Option<String>,
    pub status: ReturnStatus,
    /// Frozen at creation: `unit_price × qty × 1.18`, rounded half-up.
    pub refund_amount_paise: i64,
    pub pickup_date: Option<NaiveDate>,
    pub stock_restored: bool,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReturnRequest {
    #[inline]
    pub fn refund_amount(&self) -> Money {
        Money::from_paise(self.refund_amount_paise)
    }
}

// =============================================================================
// Payments (gateway settlement tracking)
// =============================================================================

/// Settlement state of a gateway payment.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

/// What a gateway payment pays for.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPurpose {
    /// Settles a pending checkout; order is created on verification.
    OrderPayment,
    /// Credits the wallet on verification.
    WalletTopup,
}

/// A gateway payment record, tracked independently of any order.
///
/// For order payments the checkout context (address, coupon code) is
/// carried here so the verification callback can complete placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub amount_paise: i64,
    /// Intent id returned by the gateway at creation.
    pub gateway_order_id: Option<String>,
    /// External payment id supplied in the verification callback.
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub status: PaymentStatus,
    pub purpose: PaymentPurpose,
    /// Checkout context for order payments.
    pub address_id: Option<String>,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Checkout session
// =============================================================================

/// Explicit checkout state passed into order placement.
///
/// Replaces implicit per-request session state: the server re-validates
/// the coupon against the live cart and silently drops it if it no
/// longer qualifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub user_id: String,
    /// Coupon the client believes is applied; never trusted as-is.
    pub coupon_code: Option<String>,
}

impl CheckoutSession {
    /// Session with no coupon.
    pub fn plain(user_id: impl Into<String>) -> Self {
        CheckoutSession {
            user_id: user_id.into(),
            coupon_code: None,
        }
    }

    /// Session with a client-claimed coupon code.
    pub fn with_coupon(user_id: impl Into<String>, code: impl Into<String>) -> Self {
        CheckoutSession {
            user_id: user_id.into(),
            coupon_code: Some(code.into()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
