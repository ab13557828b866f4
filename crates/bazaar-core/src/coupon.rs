//! # Coupon Validator
//!
//! Stateless coupon rule evaluation. The rules short-circuit in a fixed
//! order so every rejection carries exactly one reason code:
//!
//! ```text
//! exists+active → validity window → cart non-empty → minimum value
//!     → category restriction → per-user limit → compute discount
//! ```
//!
//! Evaluation never touches the usage counter - usage increments only on
//! confirmed order placement, so an abandoned cart never charges the
//! limit. Placement re-runs this evaluation against the live cart; the
//! client-claimed coupon is never trusted.

use chrono::NaiveDate;

use crate::error::CouponRejection;
use crate::money::Money;
use crate::pricing::PricedLine;
use crate::types::{Coupon, DiscountKind};

/// Computes the discount a coupon yields on a subtotal.
///
/// Percent coupons round half-up once on the aggregate; flat coupons
/// apply as-is. Either way the discount is clamped to the subtotal - a
/// coupon can never push a cart negative.
pub fn compute_discount(coupon: &Coupon, subtotal: Money) -> Money {
    let raw = match coupon.discount_kind {
        DiscountKind::Percent => subtotal.percent_bps(coupon.discount_value as u32),
        DiscountKind::Flat => Money::from_paise(coupon.discount_value),
    };
    raw.min(subtotal).floor_at_zero()
}

/// Evaluates a coupon against a priced cart.
///
/// ## Arguments
/// * `coupon` - the looked-up coupon, `None` when no (active) coupon
///   matched the code
/// * `subtotal` - the cart subtotal the discount applies to
/// * `lines` - priced cart lines, used for the category restriction
/// * `used_count` - this user's redemption count (0 when no usage row)
/// * `today` - date-only; the validity window is inclusive on both ends
///
/// ## Returns
/// The computed discount on success, or the first failing rule's
/// [`CouponRejection`].
pub fn evaluate(
    coupon: Option<&Coupon>,
    subtotal: Money,
    lines: &[PricedLine],
    used_count: i64,
    today: NaiveDate,
) -> Result<Money, CouponRejection> {
    // Rule 1: coupon exists and is active.
    let coupon = coupon
        .filter(|c| c.is_active)
        .ok_or(CouponRejection::InvalidCoupon)?;

    // Rule 2: validity window, date-only, inclusive both ends.
    let from = coupon.valid_from.date_naive();
    let till = coupon.valid_till.date_naive();
    if today < from || today > till {
        return Err(CouponRejection::Expired);
    }

    // Rule 3: something orderable in the cart.
    if lines.is_empty() {
        return Err(CouponRejection::EmptyCart);
    }

    // Rule 4: minimum cart value.
    if subtotal < coupon.min_cart_value() {
        return Err(CouponRejection::BelowMinimum {
            min_paise: coupon.min_cart_value_paise,
        });
    }

    // Rule 5: category restriction - at least one line must match.
    if let Some(required) = &coupon.subcategory_id {
        let matches = lines
            .iter()
            .any(|l| l.subcategory_id.as_deref() == Some(required.as_str()));
        if !matches {
            return Err(CouponRejection::CategoryMismatch);
        }
    }

    // Rule 6: per-user redemption cap.
    if used_count >= coupon.per_user_limit {
        return Err(CouponRejection::LimitReached {
            limit: coupon.per_user_limit,
        });
    }

    Ok(compute_discount(coupon, subtotal))
}

// =============================================================================
// Unit Tests
// =============================================================================
