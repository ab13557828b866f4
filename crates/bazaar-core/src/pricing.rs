//! # Pricing Engine
//!
//! Computes effective unit prices, cart totals, GST, and the delivery
//! charge. Every function here is pure: the repositories hand in cart
//! views and offers, and totals come out.
//!
//! ## Pricing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Cart Pricing Pipeline                              │
//! │                                                                         │
//! │  CartLineView[] ──► filter orderable ──► clamp qty to min(q, stock, 4) │
//! │        │                   │                                            │
//! │        │                   ▼                                            │
//! │        │          effective_unit_price (best offer)                     │
//! │        │                   │                                            │
//! │        ▼                   ▼                                            │
//! │  out_of_stock[]      line totals ──► subtotal (exact integer sum)      │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                    taxable = subtotal − discount                        │
//! │                    gst = 18% of taxable (rounded once)                  │
//! │                    delivery = ₹0 if taxable ≥ ₹1000 else ₹100          │
//! │                    grand = max(0, taxable + gst + delivery)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Discipline
//! Unit prices are integer paise. An offer-discounted effective unit
//! price is rounded half-up once; line totals and the subtotal are then
//! exact integer sums. GST and percent discounts round half-up once, on
//! the aggregate. No per-line re-rounding anywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{CartLineView, CatalogProduct, Offer, OfferScope, TaxRate};
use crate::{DELIVERY_CHARGE_PAISE, FREE_DELIVERY_THRESHOLD_PAISE, GST_RATE_BPS, MAX_ITEM_QUANTITY};

// =============================================================================
// Output Types
// =============================================================================

/// Order-level monetary aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    /// subtotal − discount; the base for GST.
    pub taxable: Money,
    pub gst: Money,
    pub delivery: Money,
    /// taxable + gst + delivery, floored at zero.
    pub grand_total: Money,
}

impl CartTotals {
    /// All-zero totals (empty or fully-invalid cart).
    pub fn zero() -> Self {
        CartTotals::default()
    }
}

/// A cart line after pricing: clamped quantity, effective unit price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub variant_id: String,
    pub product_id: String,
    pub product_name: String,
    pub subcategory_id: Option<String>,
    /// Quantity after the `min(requested, stock, 4)` clamp.
    pub quantity: i64,
    /// Catalog price minus the best applicable offer.
    pub unit_price: Money,
    pub line_total: Money,
}

/// The fully priced cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    /// Lines excluded from totals (inactive or out of stock), surfaced
    /// separately for the UI.
    pub out_of_stock: Vec<CartLineView>,
    pub totals: CartTotals,
}

impl PricedCart {
    /// Whether anything orderable remains.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Effective Price
// =============================================================================

/// Computes the effective unit price of a product: catalog price reduced
/// by the single best applicable promotional offer.
///
/// ## Offer Selection
/// - Candidate offers: active, `starts_at ≤ now ≤ ends_at`, scoped to
///   this product or its subcategory
/// - Best = largest percentage; ties resolve to the smallest offer id
///   (deterministic)
/// - No candidates ⇒ full catalog price
///
/// ## Example
/// ```rust
/// use bazaar_core::pricing::effective_unit_price;
/// use bazaar_core::types::CatalogProduct;
///
/// let product = CatalogProduct {
///     id: "p1".into(),
///     name: "Runner".into(),
///     price_paise: 100_000,
///     subcategory_id: None,
///     is_active: true,
/// };
/// // No offers: full price.
/// assert_eq!(effective_unit_price(&product, &[], chrono::Utc::now()).paise(), 100_000);
/// ```
pub fn effective_unit_price(
    product: &CatalogProduct,
    offers: &[Offer],
    now: DateTime<Utc>,
) -> Money {
    let best = offers
        .iter()
        .filter(|o| o.applies_at(now))
        .filter(|o| match o.scope {
            OfferScope::Product => o.target_id == product.id,
            OfferScope::Category => Some(o.target_id.as_str()) == product.subcategory_id.as_deref(),
        })
        // Largest percentage wins; ties break to the smallest id.
        .max_by(|a, b| {
            a.percent_bps
                .cmp(&b.percent_bps)
                .then_with(|| b.id.cmp(&a.id))
        });

    match best {
        Some(offer) => {
            let price = product.price();
            price - price.percent_bps(offer.percent_bps)
        }
        None => product.price(),
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Clamps a requested quantity to `min(requested, stock, 4)`.
pub fn clamp_quantity(requested: i64, stock: i64) -> i64 {
    requested.min(stock).min(MAX_ITEM_QUANTITY).max(0)
}

/// Derives order-level totals from a subtotal and discount.
///
/// Shared between initial checkout pricing and post-cancellation
/// recomputation, so cancelling an item re-applies the same delivery
/// threshold and GST rules that priced the cart.
///
/// A zero subtotal (empty cart, or all items cancelled) yields all-zero
/// totals - the natural result of zero active lines, not a hard-coded
/// special case elsewhere.
pub fn totals_from_subtotal(subtotal: Money, discount: Money) -> CartTotals {
    if subtotal.is_zero() {
        return CartTotals::zero();
    }

    // Discount can never exceed what is being discounted.
    let discount = discount.min(subtotal).floor_at_zero();
    let taxable = subtotal - discount;
    let gst = taxable.tax(TaxRate::from_bps(GST_RATE_BPS));
    let delivery = if taxable.paise() >= FREE_DELIVERY_THRESHOLD_PAISE {
        Money::zero()
    } else {
        Money::from_paise(DELIVERY_CHARGE_PAISE)
    };
    let grand_total = (taxable + gst + delivery).floor_at_zero();

    CartTotals {
        subtotal,
        discount,
        taxable,
        gst,
        delivery,
        grand_total,
    }
}

/// Prices a user's cart.
///
/// Lines whose product or variant is inactive, or whose stock is zero,
/// are excluded from totals and returned in `out_of_stock`. An empty or
/// fully-invalid cart produces all-zero totals, not an error.
///
/// `discount` is whatever the coupon validator already computed for this
/// cart (zero when no coupon is in play).
pub fn price_cart(
    lines: &[CartLineView],
    offers: &[Offer],
    discount: Money,
    now: DateTime<Utc>,
) -> PricedCart {
    let mut priced = Vec::new();
    let mut out_of_stock = Vec::new();

    for line in lines {
        if !line.is_orderable() {
            out_of_stock.push(line.clone());
            continue;
        }

        let product = CatalogProduct {
            id: line.product_id.clone(),
            name: line.product_name.clone(),
            price_paise: line.price_paise,
            subcategory_id: line.subcategory_id.clone(),
            is_active: line.product_active,
        };

        let quantity = clamp_quantity(line.quantity, line.stock);
        let unit_price = effective_unit_price(&product, offers, now);

        priced.push(PricedLine {
            variant_id: line.variant_id.clone(),
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            subcategory_id: line.subcategory_id.clone(),
            quantity,
            unit_price,
            line_total: unit_price.multiply_quantity(quantity),
        });
    }

    let subtotal: Money = priced.iter().map(|l| l.line_total).sum();
    let totals = totals_from_subtotal(subtotal, discount);

    PricedCart {
        lines: priced,
        out_of_stock,
        totals,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
