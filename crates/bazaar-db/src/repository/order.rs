//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Lifecycle (storage view)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. PLACE (one transaction, driven by the checkout service)            │
//! │     └── insert_order() + insert_item()×N   frozen names and prices     │
//! │                                                                         │
//! │  2. FULFIL                                                             │
//! │     └── update_status()       operator transitions                     │
//! │     └── cascade_item_status() items follow the order                   │
//! │                                                                         │
//! │  3. CANCEL (order or single item)                                      │
//! │     └── update_item_status() + update_totals()                         │
//! │         stock restore / refund handled by the fulfillment service      │
//! │         in the same transaction                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use serde::Serialize;

use crate::error::{DbError, DbResult};
use bazaar_core::{Money, Order, OrderItem, OrderItemStatus, OrderStatus};

/// An order with its items, the shape an invoice or order-detail page
/// renders from.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderSummary {
    /// Sum of the still-live line totals, at the frozen prices.
    pub fn live_items_total(&self) -> Money {
        self.items
            .iter()
            .filter(|i| i.is_live())
            .fold(Money::zero(), |acc, i| acc + i.line_total())
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, order_code, user_id, address_id,
                subtotal_paise, discount_paise, gst_paise, delivery_paise, total_paise,
                status, payment_method, coupon_id, coupon_code,
                cancel_reason, delivered_at, created_at, updated_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets an order by its public code.
    pub async fn get_by_code(&self, order_code: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, order_code, user_id, address_id,
                subtotal_paise, discount_paise, gst_paise, delivery_paise, total_paise,
                status, payment_method, coupon_id, coupon_code,
                cancel_reason, delivered_at, created_at, updated_at
            FROM orders
            WHERE order_code = ?1
            "#,
        )
        .bind(order_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Lists a user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, order_code, user_id, address_id,
                subtotal_paise, discount_paise, gst_paise, delivery_paise, total_paise,
                status, payment_method, coupon_id, coupon_code,
                cancel_reason, delivered_at, created_at, updated_at
            FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Gets all items of an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, variant_id, product_name, quantity,
                   unit_price_paise, status, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets an order together with all of its items.
    pub async fn summary(&self, order_id: &str) -> DbResult<Option<OrderSummary>> {
        let Some(order) = self.get_by_id(order_id).await? else {
            return Ok(None);
        };
        let items = self.get_items(order_id).await?;
        Ok(Some(OrderSummary { order, items }))
    }

    /// Gets one order item by ID.
    pub async fn get_item(&self, item_id: &str) -> DbResult<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, variant_id, product_name, quantity,
                   unit_price_paise, status, created_at
            FROM order_items
            WHERE id = ?1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }
}

// =============================================================================
// Transaction-composable mutations
// =============================================================================

/// Inserts an order inside an open transaction.
pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, order_code = %order.order_code, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_code, user_id, address_id,
            subtotal_paise, discount_paise, gst_paise, delivery_paise, total_paise,
            status, payment_method, coupon_id, coupon_code,
            cancel_reason, delivered_at, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15, ?16, ?17
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_code)
    .bind(&order.user_id)
    .bind(&order.address_id)
    .bind(order.subtotal_paise)
    .bind(order.discount_paise)
    .bind(order.gst_paise)
    .bind(order.delivery_paise)
    .bind(order.total_paise)
    .bind(order.status)
    .bind(order.payment_method)
    .bind(&order.coupon_id)
    .bind(&order.coupon_code)
    .bind(&order.cancel_reason)
    .bind(order.delivered_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts an order item inside an open transaction.
///
/// ## Snapshot Pattern
/// Product name and effective unit price are copied to the item. The
/// order history stays intact even if the catalog changes later.
pub async fn insert_item(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
    debug!(order_id = %item.order_id, variant_id = %item.variant_id, "Inserting order item");

    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, variant_id, product_name,
            quantity, unit_price_paise, status, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.variant_id)
    .bind(&item.product_name)
    .bind(item.quantity)
    .bind(item.unit_price_paise)
    .bind(item.status)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Updates an order's status inside an open transaction.
///
/// Stamps `delivered_at` on entry to Delivered and clears it when the
/// status is corrected away from Delivered.
pub async fn update_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    status: OrderStatus,
) -> DbResult<()> {
    let now = Utc::now();
    let delivered_at: Option<DateTime<Utc>> = match status {
        OrderStatus::Delivered => Some(now),
        _ => None,
    };

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?2, delivered_at = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(delivered_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", order_id));
    }

    Ok(())
}

/// Marks an order cancelled with a reason inside an open transaction.
pub async fn set_cancelled(
    conn: &mut SqliteConnection,
    order_id: &str,
    reason: &str,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?2, cancel_reason = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(OrderStatus::Cancelled)
    .bind(reason)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", order_id));
    }

    Ok(())
}

/// Rewrites an order's money columns inside an open transaction.
///
/// ## When To Call
/// After a single-item cancellation changes the live-item set.
pub async fn update_totals(
    conn: &mut SqliteConnection,
    order_id: &str,
    subtotal_paise: i64,
    discount_paise: i64,
    gst_paise: i64,
    delivery_paise: i64,
    total_paise: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE orders SET
            subtotal_paise = ?2,
            discount_paise = ?3,
            gst_paise = ?4,
            delivery_paise = ?5,
            total_paise = ?6,
            updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(subtotal_paise)
    .bind(discount_paise)
    .bind(gst_paise)
    .bind(delivery_paise)
    .bind(total_paise)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Order", order_id));
    }

    Ok(())
}

/// Clears an order's coupon snapshot inside an open transaction.
///
/// Used when cancellations drop the subtotal below the coupon's minimum
/// and the discount is forfeited.
pub async fn clear_coupon(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET coupon_id = NULL, coupon_code = NULL, updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(order_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Updates one item's status inside an open transaction.
pub async fn update_item_status(
    conn: &mut SqliteConnection,
    item_id: &str,
    status: OrderItemStatus,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE order_items SET status = ?2 WHERE id = ?1")
        .bind(item_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("OrderItem", item_id));
    }

    Ok(())
}

/// Moves every non-cancelled, non-returned, non-refunded item of an
/// order to `status`, inside an open transaction.
///
/// Items that already left the fulfillment path keep their status.
pub async fn cascade_item_status(
    conn: &mut SqliteConnection,
    order_id: &str,
    status: OrderItemStatus,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE order_items
        SET status = ?2
        WHERE order_id = ?1
          AND status NOT IN ('cancelled', 'returned', 'refunded')
        "#,
    )
    .bind(order_id)
    .bind(status)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Identifier generation
// =============================================================================

/// Generates a public order code in format: ORD-YYYYMMDD-XXXXXXXX
///
/// ## Format
/// - YYYYMMDD: placement date
/// - XXXXXXXX: first 8 hex chars of a UUID v4 (uppercased)
///
/// ## Example
/// `ORD-20260829-9F2C41AB`
pub fn generate_order_code() -> String {
    let date_part = Utc::now().format("%Y%m%d");
    let unique = Uuid::new_v4().simple().to_string();
    format!("ORD-{}-{}", date_part, unique[..8].to_uppercase())
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new order item ID.
pub fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_code_shape() {
        let code = generate_order_code();
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_order_codes_unique() {
        let a = generate_order_code();
        let b = generate_order_code();
        assert_ne!(a, b);
    }
}
