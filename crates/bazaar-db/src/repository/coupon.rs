//! # Coupon Repository
//!
//! Coupon lookup and per-user usage counters.
//!
//! ## Usage Counter Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Order placed with coupon    →  increment_usage()  (upsert, +1)        │
//! │  Order fully cancelled       →  release_usage()    (-1, floor 0)       │
//! │                                                                         │
//! │  Both run inside the placement/cancellation transaction, so the        │
//! │  counter can never drift from the set of live orders.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use bazaar_core::{Coupon, CouponUsage};

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new CouponRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Finds a coupon by redemption code, case-insensitively.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT
                id, name, code, discount_kind, discount_value,
                min_cart_value_paise, per_user_limit, subcategory_id,
                valid_from, valid_till, is_active, created_at, updated_at
            FROM coupons
            WHERE code = ?1 COLLATE NOCASE
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Gets a coupon by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT
                id, name, code, discount_kind, discount_value,
                min_cart_value_paise, per_user_limit, subcategory_id,
                valid_from, valid_till, is_active, created_at, updated_at
            FROM coupons
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Inserts a coupon (seed/admin path).
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, name, code, discount_kind, discount_value,
                min_cart_value_paise, per_user_limit, subcategory_id,
                valid_from, valid_till, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.name)
        .bind(&coupon.code)
        .bind(coupon.discount_kind)
        .bind(coupon.discount_value)
        .bind(coupon.min_cart_value_paise)
        .bind(coupon.per_user_limit)
        .bind(&coupon.subcategory_id)
        .bind(coupon.valid_from)
        .bind(coupon.valid_till)
        .bind(coupon.is_active)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// How many times a user has redeemed a coupon.
    pub async fn usage_count(&self, user_id: &str, coupon_id: &str) -> DbResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT used_count FROM coupon_usages
            WHERE user_id = ?1 AND coupon_id = ?2
            "#,
        )
        .bind(user_id)
        .bind(coupon_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }

    /// Gets the usage row for a (user, coupon) pair.
    pub async fn get_usage(&self, user_id: &str, coupon_id: &str) -> DbResult<Option<CouponUsage>> {
        let usage = sqlx::query_as::<_, CouponUsage>(
            r#"
            SELECT id, user_id, coupon_id, used_count
            FROM coupon_usages
            WHERE user_id = ?1 AND coupon_id = ?2
            "#,
        )
        .bind(user_id)
        .bind(coupon_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(usage)
    }
}

// =============================================================================
// Transaction-composable usage mutations
// =============================================================================

/// Records one successful coupon redemption inside an open transaction.
///
/// Upsert: first redemption creates the counter row at 1.
pub async fn increment_usage(
    conn: &mut SqliteConnection,
    user_id: &str,
    coupon_id: &str,
) -> DbResult<()> {
    debug!(user_id, coupon_id, "Incrementing coupon usage");

    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO coupon_usages (id, user_id, coupon_id, used_count)
        VALUES (?1, ?2, ?3, 1)
        ON CONFLICT (user_id, coupon_id)
        DO UPDATE SET used_count = used_count + 1
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(coupon_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Releases one redemption inside an open transaction, flooring at zero.
///
/// Called when an order that used the coupon is fully cancelled.
pub async fn release_usage(
    conn: &mut SqliteConnection,
    user_id: &str,
    coupon_id: &str,
) -> DbResult<()> {
    debug!(user_id, coupon_id, "Releasing coupon usage");

    sqlx::query(
        r#"
        UPDATE coupon_usages
        SET used_count = MAX(used_count - 1, 0)
        WHERE user_id = ?1 AND coupon_id = ?2
        "#,
    )
    .bind(user_id)
    .bind(coupon_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
