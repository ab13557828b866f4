//! # Order Lifecycle
//!
//! The state machine governing an order and its line items from
//! creation through delivery, cancellation, and into the return window.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Order State Machine                                │
//! │                                                                         │
//! │   Pending ──► Processing ──► Shipped ──► Delivered (terminal-success)  │
//! │      │             │                         │                          │
//! │      │             │                         └──► 10-day return window  │
//! │      ▼             ▼                                                    │
//! │   Cancelled ◄──────┘          (terminal-failure; not reachable from    │
//! │                                Shipped/Delivered - use returns)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module holds the pure rules: which transitions are legal, what
//! the order totals become after a line item is cancelled, and what the
//! refund delta is. The fulfillment service in bazaar-db applies them
//! inside one database transaction.

use serde::{Deserialize, Serialize};

use crate::coupon::compute_discount;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::{totals_from_subtotal, CartTotals};
use crate::types::{Coupon, OrderItem, OrderItemStatus, OrderStatus};
use crate::COD_LIMIT_PAISE;

// =============================================================================
// Commands
// =============================================================================

/// Typed operator command for an order status change.
///
/// Operator mutations go through explicit command structs validated
/// before any mutation - never open-ended field assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatusCommand {
    pub order_id: String,
    pub new_status: OrderStatus,
}

// =============================================================================
// Transition Rules
// =============================================================================

/// Checks an operator-driven order status transition.
///
/// ## Rules
/// - Same status is a no-op (callers skip the write entirely)
/// - Nothing leaves `Cancelled`
/// - `Cancelled` is reachable only before shipment; a shipped or
///   delivered order is unwound through the return workflow instead
/// - Moving away from `Delivered` is allowed (operator correction) and
///   clears `delivered_at`
pub fn check_operator_transition(from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if from == to {
        return Ok(());
    }

    let allowed = match (from, to) {
        (OrderStatus::Cancelled, _) => false,
        (OrderStatus::Shipped | OrderStatus::Delivered, OrderStatus::Cancelled) => false,
        _ => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidOrderTransition { from, to })
    }
}

/// Checks whether a line item may still be cancelled.
///
/// Forbidden once the order is `Shipped`, `Delivered`, or `Cancelled`,
/// or if the item is already `Cancelled`. All checks are re-run inside
/// the transaction, so a double form submission is rejected rather than
/// re-applied.
pub fn check_item_cancellable(
    order_status: OrderStatus,
    item: &OrderItem,
) -> CoreResult<()> {
    match order_status {
        OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled => {
            return Err(CoreError::OrderNotCancellable {
                status: order_status,
            });
        }
        _ => {}
    }

    if item.status == OrderItemStatus::Cancelled {
        return Err(CoreError::ItemAlreadyCancelled {
            item_id: item.id.clone(),
        });
    }

    Ok(())
}

/// Checks the COD ceiling at placement time.
pub fn check_cod_allowed(total: Money) -> CoreResult<()> {
    if total.paise() >= COD_LIMIT_PAISE {
        return Err(CoreError::CodLimitExceeded {
            total_paise: total.paise(),
            limit_paise: COD_LIMIT_PAISE,
        });
    }
    Ok(())
}

// =============================================================================
// Recomputation After Cancellation
// =============================================================================

/// The result of recomputing an order after line-item cancellation.
#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    /// New order-level totals, derived from the remaining live items.
    pub totals: CartTotals,
    /// True when an attached coupon was forfeited because the remaining
    /// subtotal fell below its minimum cart value. Forfeited means gone:
    /// the coupon is not re-validated against the smaller cart.
    pub coupon_forfeited: bool,
    /// True when no live items remain and the order collapses to
    /// `Cancelled` as a whole.
    pub order_emptied: bool,
}

/// Recomputes order totals from the remaining non-cancelled items.
///
/// ## Coupon Handling
/// - No coupon: discount stays zero
/// - Coupon attached, new subtotal ≥ its minimum: the discount is
///   recomputed (percent or flat) against the new subtotal
/// - Coupon attached, new subtotal below its minimum: the coupon is
///   forfeited and the discount drops to zero
///
/// GST and the delivery threshold re-apply to the new taxable amount,
/// so cancelling an item can bring the ₹100 delivery fee back.
///
/// Zero live items yields the natural all-zero totals (never hard-coded
/// zeros elsewhere) and marks the order emptied.
pub fn recompute_after_cancellation(
    live_items: &[&OrderItem],
    coupon: Option<&Coupon>,
) -> CancellationOutcome {
    let subtotal: Money = live_items.iter().map(|i| i.line_total()).sum();

    let (discount, coupon_forfeited) = match coupon {
        Some(c) if subtotal >= c.min_cart_value() && !subtotal.is_zero() => {
            (compute_discount(c, subtotal), false)
        }
        Some(_) => (Money::zero(), true),
        None => (Money::zero(), false),
    };

    CancellationOutcome {
        totals: totals_from_subtotal(subtotal, discount),
        coupon_forfeited,
        order_emptied: live_items.is_empty(),
    }
}

/// The wallet refund owed after a recomputation: old total minus new
/// total, floored at zero. Only prepaid orders actually receive it.
pub fn refund_delta(old_total: Money, new_total: Money) -> Money {
    (old_total - new_total).floor_at_zero()
}

// =============================================================================
// Unit Tests
// =============================================================================
