//! # Return / Refund Workflow
//!
//! Post-delivery state machine for a single line item.
//!
//! ```text
//! Requested → Approved → PickupScheduled → PickedUp → RefundInitiated → Refunded
//!     │           │             │              │             │
//!     └───────────┴─────────────┴──────────────┴─────────────┴──► Declined
//! ```
//!
//! The refund amount is computed once at request creation and never
//! recalculated, even if price data changes afterwards. The first
//! transition into `Refunded` restores stock and credits the wallet
//! exactly once (the `stock_restored` latch in the service layer);
//! repeated saves in that state are inert.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{OrderItem, OrderItemStatus, OrderStatus, ReturnStatus, TaxRate};
use crate::{GST_RATE_BPS, RETURN_WINDOW_DAYS};

/// Checks return eligibility for an order item.
///
/// ## Rules
/// - Order must be `Delivered` with `delivered_at` stamped
/// - Today must be within `delivered_at + 10 days` (date-only)
/// - The item itself must be in `Delivered` state (not cancelled, not
///   already in a return flow)
///
/// The one-request-per-item rule is enforced by the database's unique
/// index; the service layer maps that violation to
/// [`CoreError::DuplicateReturnRequest`].
pub fn check_return_eligibility(
    order_status: OrderStatus,
    delivered_at: Option<DateTime<Utc>>,
    item: &OrderItem,
    today: NaiveDate,
) -> CoreResult<()> {
    let delivered_at = match (order_status, delivered_at) {
        (OrderStatus::Delivered, Some(ts)) => ts,
        _ => {
            return Err(CoreError::OrderNotDelivered {
                status: order_status,
            })
        }
    };

    let window_closes = delivered_at.date_naive() + Duration::days(RETURN_WINDOW_DAYS);
    if today > window_closes {
        return Err(CoreError::ReturnWindowExpired {
            window_days: RETURN_WINDOW_DAYS,
        });
    }

    if item.status != OrderItemStatus::Delivered {
        return Err(CoreError::ItemNotReturnable {
            status: item.status,
        });
    }

    Ok(())
}

/// Computes the refund for a returned item:
/// `unit_price × quantity × 1.18`, rounded half-up once.
///
/// The refund includes proportional GST but ignores the delivery charge
/// and any coupon discount allocation - a documented simplification
/// carried over from the storefront's refund policy.
///
/// ## Example
/// ```rust
/// use bazaar_core::money::Money;
/// use bazaar_core::returns::calculate_refund;
/// use bazaar_core::types::{OrderItem, OrderItemStatus};
///
/// let item = OrderItem {
///     id: "i1".into(),
///     order_id: "o1".into(),
///     variant_id: "v1".into(),
///     product_name: "Runner".into(),
///     quantity: 2,
///     unit_price_paise: 30_000, // ₹300.00
///     status: OrderItemStatus::Delivered,
///     created_at: chrono::Utc::now(),
/// };
/// // ₹600 × 1.18 = ₹708.00
/// assert_eq!(calculate_refund(&item).paise(), 70_800);
/// ```
pub fn calculate_refund(item: &OrderItem) -> Money {
    let line = item.line_total();
    line + line.tax(TaxRate::from_bps(GST_RATE_BPS))
}

/// Checks a return workflow transition.
///
/// The chain is strictly linear; `Declined` is reachable from any
/// pre-`Refunded` state; the two terminal states accept nothing.
pub fn check_return_transition(from: ReturnStatus, to: ReturnStatus) -> CoreResult<()> {
    use ReturnStatus::*;

    let allowed = match (from, to) {
        (Requested, Approved)
        | (Approved, PickupScheduled)
        | (PickupScheduled, PickedUp)
        | (PickedUp, RefundInitiated)
        | (RefundInitiated, Refunded) => true,
        (Refunded | Declined, _) => false,
        (_, Declined) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidReturnTransition { from, to })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn delivered_item() -> OrderItem {
        OrderItem {
            id: "i1".into(),
            order_id: "o1".into(),
            variant_id: "v1".into(),
            product_name: "Runner".into(),
            quantity: 2,
            unit_price_paise: 30_000,
            status: OrderItemStatus::Delivered,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_eligibility_requires_delivered_order() {
        let item = delivered_item();
        let err = check_return_eligibility(
            OrderStatus::Shipped,
            None,
            &item,
            Utc::now().date_naive(),
        );
        assert!(matches!(err, Err(CoreError::OrderNotDelivered { .. })));
    }

    #[test]
    fn test_eligibility_within_window() {
        let item = delivered_item();
        let delivered = Utc::now() - Duration::days(9);
        assert!(check_return_eligibility(
            OrderStatus::Delivered,
            Some(delivered),
            &item,
            Utc::now().date_naive(),
        )
        .is_ok());
    }

    #[test]
    fn test_eligibility_on_last_day_of_window() {
        let item = delivered_item();
        let delivered = Utc::now() - Duration::days(RETURN_WINDOW_DAYS);
        // Day 10 is still inside the window (date-only, inclusive).
        assert!(check_return_eligibility(
            OrderStatus::Delivered,
            Some(delivered),
            &item,
            Utc::now().date_naive(),
        )
        .is_ok());
    }

    #[test]
    fn test_eligibility_window_expired() {
        let item = delivered_item();
        let delivered = Utc::now() - Duration::days(RETURN_WINDOW_DAYS + 1);
        let err = check_return_eligibility(
            OrderStatus::Delivered,
            Some(delivered),
            &item,
            Utc::now().date_naive(),
        );
        assert!(matches!(err, Err(CoreError::ReturnWindowExpired { .. })));
    }

    #[test]
    fn test_cancelled_item_not_returnable() {
        let mut item = delivered_item();
        item.status = OrderItemStatus::Cancelled;
        let err = check_return_eligibility(
            OrderStatus::Delivered,
            Some(Utc::now()),
            &item,
            Utc::now().date_naive(),
        );
        assert!(matches!(err, Err(CoreError::ItemNotReturnable { .. })));
    }

    // Scenario E: ₹300 × 2 → refund ₹708.00.
    #[test]
    fn test_refund_includes_proportional_gst() {
        assert_eq!(calculate_refund(&delivered_item()).paise(), 70_800);
    }

    #[test]
    fn test_linear_chain() {
        use ReturnStatus::*;
        assert!(check_return_transition(Requested, Approved).is_ok());
        assert!(check_return_transition(Approved, PickupScheduled).is_ok());
        assert!(check_return_transition(PickupScheduled, PickedUp).is_ok());
        assert!(check_return_transition(PickedUp, RefundInitiated).is_ok());
        assert!(check_return_transition(RefundInitiated, Refunded).is_ok());

        // No skipping ahead.
        assert!(check_return_transition(Requested, Refunded).is_err());
        assert!(check_return_transition(Approved, RefundInitiated).is_err());
    }

    #[test]
    fn test_declined_from_any_pre_refunded_state() {
        use ReturnStatus::*;
        for from in [Requested, Approved, PickupScheduled, PickedUp, RefundInitiated] {
            assert!(check_return_transition(from, Declined).is_ok());
        }
        assert!(check_return_transition(Refunded, Declined).is_err());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        use ReturnStatus::*;
        assert!(check_return_transition(Refunded, Approved).is_err());
        assert!(check_return_transition(Declined, Requested).is_err());
    }
}
