//! # Cart Repository
//!
//! Cart line storage and the joined view the pricing engine consumes.
//!
//! ## Cart → Pricing Handoff
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  cart_lines ──JOIN── product_variants ──JOIN── products                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Vec<CartLineView>   (quantity, price, stock, active flags,            │
//! │       │               subcategory - everything pricing needs)         │
//! │       ▼                                                                 │
//! │  bazaar_core::pricing::price_cart()   ← pure, no further lookups       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::{CartLine, CartLineView, MAX_ITEM_QUANTITY};

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Adds a variant to a user's cart, merging with an existing line.
    ///
    /// The merged quantity is clamped to [`MAX_ITEM_QUANTITY`]. Returns
    /// the resulting line.
    pub async fn add_line(
        &self,
        user_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> DbResult<CartLine> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        debug!(user_id, variant_id, quantity, "Adding cart line");

        sqlx::query(
            r#"
            INSERT INTO cart_lines (id, user_id, variant_id, quantity, added_at)
            VALUES (?1, ?2, ?3, MIN(?4, ?5), ?6)
            ON CONFLICT (user_id, variant_id)
            DO UPDATE SET quantity = MIN(quantity + ?4, ?5)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(variant_id)
        .bind(quantity)
        .bind(MAX_ITEM_QUANTITY)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let line = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, user_id, variant_id, quantity, added_at
            FROM cart_lines
            WHERE user_id = ?1 AND variant_id = ?2
            "#,
        )
        .bind(user_id)
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(line)
    }

    /// Sets a cart line's quantity outright (clamped to the cap).
    pub async fn set_quantity(
        &self,
        user_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cart_lines
            SET quantity = MIN(?3, ?4)
            WHERE user_id = ?1 AND variant_id = ?2
            "#,
        )
        .bind(user_id)
        .bind(variant_id)
        .bind(quantity)
        .bind(MAX_ITEM_QUANTITY)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartLine", variant_id));
        }

        Ok(())
    }

    /// Removes one line from a user's cart.
    pub async fn remove_line(&self, user_id: &str, variant_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = ?1 AND variant_id = ?2")
            .bind(user_id)
            .bind(variant_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Gets a user's raw cart lines.
    pub async fn lines_for_user(&self, user_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, user_id, variant_id, quantity, added_at
            FROM cart_lines
            WHERE user_id = ?1
            ORDER BY added_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Gets a user's cart joined with catalog data, ready for pricing.
    ///
    /// Out-of-stock and inactive lines are included; the pricing engine
    /// decides their treatment (excluded from totals, reported in
    /// `out_of_stock`).
    pub async fn view_for_user(&self, user_id: &str) -> DbResult<Vec<CartLineView>> {
        let views = sqlx::query_as::<_, CartLineView>(
            r#"
            SELECT
                v.id            AS variant_id,
                p.id            AS product_id,
                p.name          AS product_name,
                p.subcategory_id,
                c.quantity,
                p.price_paise,
                v.stock,
                p.is_active     AS product_active,
                v.is_active     AS variant_active
            FROM cart_lines c
            JOIN product_variants v ON v.id = c.variant_id
            JOIN products p ON p.id = v.product_id
            WHERE c.user_id = ?1
            ORDER BY c.added_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(views)
    }
}

// =============================================================================
// Transaction-composable mutations
// =============================================================================

/// Empties a user's cart inside an open transaction.
///
/// Part of order placement: the cart is cleared in the same transaction
/// that creates the order, so a rollback restores it.
pub async fn clear_cart(conn: &mut SqliteConnection, user_id: &str) -> DbResult<()> {
    debug!(user_id, "Clearing cart");

    sqlx::query("DELETE FROM cart_lines WHERE user_id = ?1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
