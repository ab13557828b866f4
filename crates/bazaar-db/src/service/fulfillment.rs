//! # Fulfillment Service
//!
//! Operator status updates and cancellation (whole order or single
//! item).
//!
//! ## Cancellation Effects
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Whole order cancel (one transaction):                                 │
//! │    restore stock of live items → credit wallet (prepaid only)          │
//! │    → release coupon usage → totals to zero, coupon snapshot cleared    │
//! │    → items to Cancelled → order Cancelled                              │
//! │                                                                         │
//! │  Single item cancel (one transaction):                                 │
//! │    item to Cancelled → restore its stock → recompute totals            │
//! │    (coupon re-checked against the smaller cart, forfeited below        │
//! │    its minimum) → credit the delta (prepaid only)                      │
//! │                                                                         │
//! │  Cancelling the last live item collapses into the whole-order path.    │
//! │                                                                         │
//! │  COD orders restore stock but never credit the wallet - nothing        │
//! │  was collected.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{info, instrument};

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::repository::{catalog, coupon as coupon_repo, order as order_repo};
use crate::service::gateway::{notify_best_effort, NotificationEvent, Notifier};
use crate::service::ledger;
use bazaar_core::lifecycle::{
    check_item_cancellable, check_operator_transition, recompute_after_cancellation, refund_delta,
    UpdateOrderStatusCommand,
};
use bazaar_core::{Money, Order, OrderItem, OrderItemStatus, OrderStatus};

/// Order lifecycle operations after placement.
#[derive(Debug)]
pub struct FulfillmentService<N> {
    db: Database,
    notifier: N,
}

impl<N: Notifier> FulfillmentService<N> {
    /// Creates a new FulfillmentService.
    pub fn new(db: Database, notifier: N) -> Self {
        FulfillmentService { db, notifier }
    }

    /// Applies an operator status transition.
    ///
    /// A transition to `Cancelled` routes through the whole-order
    /// cancellation path so stock, refund, and coupon effects all run.
    /// Item statuses cascade to match the order, except items that
    /// already left the fulfillment path.
    #[instrument(skip(self))]
    pub async fn update_status(&self, command: UpdateOrderStatusCommand) -> ServiceResult<Order> {
        let order = self.get_order(&command.order_id).await?;

        check_operator_transition(order.status, command.new_status)
            .map_err(ServiceError::Domain)?;

        if order.status == command.new_status {
            return Ok(order);
        }

        if command.new_status == OrderStatus::Cancelled {
            return self.cancel_order(&command.order_id, "Cancelled by operator").await;
        }

        let mut tx = self.db.pool().begin().await?;
        order_repo::update_status(&mut *tx, &order.id, command.new_status).await?;
        order_repo::cascade_item_status(&mut *tx, &order.id, item_status_for(command.new_status))
            .await?;
        tx.commit().await?;

        info!(order_code = %order.order_code, status = ?command.new_status, "Order status updated");

        notify_best_effort(
            &self.notifier,
            NotificationEvent::OrderStatusChanged {
                user_id: order.user_id.clone(),
                order_code: order.order_code.clone(),
                status: format!("{:?}", command.new_status),
            },
        )
        .await;

        self.get_order(&order.id).await
    }

    /// Cancels a whole order.
    ///
    /// Allowed only while the order is `Pending` or `Processing`.
    #[instrument(skip(self, reason))]
    pub async fn cancel_order(&self, order_id: &str, reason: &str) -> ServiceResult<Order> {
        let order = self.get_order(order_id).await?;

        check_operator_transition(order.status, OrderStatus::Cancelled)
            .map_err(ServiceError::Domain)?;

        let items = self.db.orders().get_items(order_id).await?;
        let live: Vec<&OrderItem> = items.iter().filter(|i| i.is_live()).collect();

        // Refund is owed against what was actually collected, so it is
        // computed from the totals as they stood before cancellation.
        let refund = if order.payment_method.is_prepaid() {
            order.total()
        } else {
            Money::zero()
        };

        let coupon = match &order.coupon_id {
            Some(id) => self.db.coupons().get_by_id(id).await?,
            None => None,
        };
        let outcome = recompute_after_cancellation(&[], coupon.as_ref());

        let wallet = if refund.is_positive() {
            Some(self.db.wallets().get_or_create(&order.user_id).await?)
        } else {
            None
        };

        let mut tx = self.db.pool().begin().await?;

        for item in &live {
            catalog::restore_stock(&mut *tx, &item.variant_id, item.quantity).await?;
        }

        if let Some(wallet) = &wallet {
            ledger::credit(
                &mut *tx,
                &wallet.id,
                refund,
                &format!("Refund for cancelled order {}", order.order_code),
            )
            .await?;
        }

        if let Some(coupon_id) = &order.coupon_id {
            coupon_repo::release_usage(&mut *tx, &order.user_id, coupon_id).await?;
        }

        order_repo::update_totals(
            &mut *tx,
            order_id,
            outcome.totals.subtotal.paise(),
            outcome.totals.discount.paise(),
            outcome.totals.gst.paise(),
            outcome.totals.delivery.paise(),
            outcome.totals.grand_total.paise(),
        )
        .await?;

        if outcome.coupon_forfeited {
            order_repo::clear_coupon(&mut *tx, order_id).await?;
        }

        order_repo::cascade_item_status(&mut *tx, order_id, OrderItemStatus::Cancelled).await?;
        order_repo::set_cancelled(&mut *tx, order_id, reason).await?;

        tx.commit().await?;

        info!(order_code = %order.order_code, refund = refund.paise(), "Order cancelled");

        notify_best_effort(
            &self.notifier,
            NotificationEvent::OrderCancelled {
                user_id: order.user_id.clone(),
                order_code: order.order_code.clone(),
                refund_paise: refund.paise(),
            },
        )
        .await;

        self.get_order(order_id).await
    }

    /// Cancels a single line item and reprices the order.
    ///
    /// Totals are recomputed from the remaining live items; the coupon
    /// is forfeited if the smaller subtotal falls below its minimum.
    /// Prepaid orders are refunded the difference between old and new
    /// totals. Cancelling the last live item cancels the whole order.
    #[instrument(skip(self))]
    pub async fn cancel_item(&self, order_id: &str, item_id: &str) -> ServiceResult<Order> {
        let order = self.get_order(order_id).await?;
        let items = self.db.orders().get_items(order_id).await?;

        let item = items
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| DbError::not_found("OrderItem", item_id))?;

        check_item_cancellable(order.status, item).map_err(ServiceError::Domain)?;

        let remaining: Vec<&OrderItem> = items
            .iter()
            .filter(|i| i.is_live() && i.id != item_id)
            .collect();

        if remaining.is_empty() {
            return self.cancel_order(order_id, "All items cancelled").await;
        }

        let coupon = match &order.coupon_id {
            Some(id) => self.db.coupons().get_by_id(id).await?,
            None => None,
        };

        let outcome = recompute_after_cancellation(&remaining, coupon.as_ref());
        let refund = if order.payment_method.is_prepaid() {
            refund_delta(order.total(), outcome.totals.grand_total)
        } else {
            Money::zero()
        };

        let wallet = if refund.is_positive() {
            Some(self.db.wallets().get_or_create(&order.user_id).await?)
        } else {
            None
        };

        let mut tx = self.db.pool().begin().await?;

        order_repo::update_item_status(&mut *tx, item_id, OrderItemStatus::Cancelled).await?;
        catalog::restore_stock(&mut *tx, &item.variant_id, item.quantity).await?;

        order_repo::update_totals(
            &mut *tx,
            order_id,
            outcome.totals.subtotal.paise(),
            outcome.totals.discount.paise(),
            outcome.totals.gst.paise(),
            outcome.totals.delivery.paise(),
            outcome.totals.grand_total.paise(),
        )
        .await?;

        if outcome.coupon_forfeited {
            order_repo::clear_coupon(&mut *tx, order_id).await?;
        }

        if let Some(wallet) = &wallet {
            ledger::credit(
                &mut *tx,
                &wallet.id,
                refund,
                &format!("Partial refund for order {}", order.order_code),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            order_code = %order.order_code,
            item_id,
            refund = refund.paise(),
            coupon_forfeited = outcome.coupon_forfeited,
            "Order item cancelled"
        );

        notify_best_effort(
            &self.notifier,
            NotificationEvent::ItemCancelled {
                user_id: order.user_id.clone(),
                order_code: order.order_code.clone(),
                item_id: item_id.to_string(),
                refund_paise: refund.paise(),
            },
        )
        .await;

        self.get_order(order_id).await
    }

    async fn get_order(&self, order_id: &str) -> ServiceResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", order_id).into())
    }
}

/// The item status mirroring an order status during normal fulfillment.
fn item_status_for(status: OrderStatus) -> OrderItemStatus {
    match status {
        OrderStatus::Pending => OrderItemStatus::Pending,
        OrderStatus::Processing => OrderItemStatus::Processing,
        OrderStatus::Shipped => OrderItemStatus::Shipped,
        OrderStatus::Delivered => OrderItemStatus::Delivered,
        OrderStatus::Cancelled => OrderItemStatus::Cancelled,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_status_mirrors_order_status() {
        assert_eq!(item_status_for(OrderStatus::Shipped), OrderItemStatus::Shipped);
        assert_eq!(item_status_for(OrderStatus::Delivered), OrderItemStatus::Delivered);
        assert_eq!(item_status_for(OrderStatus::Cancelled), OrderItemStatus::Cancelled);
    }
}
