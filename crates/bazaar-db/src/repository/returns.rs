//! # Return Repository
//!
//! Storage for post-delivery return requests.
//!
//! ## One Request Per Item
//! The `order_item_id` column carries a unique index, so a duplicate
//! request fails at insert time even if two submissions race past the
//! service-level check.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::{ReturnRequest, ReturnStatus};

/// Repository for return-request database operations.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    /// Creates a new ReturnRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Gets a return request by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ReturnRequest>> {
        let request = sqlx::query_as::<_, ReturnRequest>(
            r#"
            SELECT
                id, order_item_id, user_id, reason, comments,
                image1, image2, image3, status, refund_amount_paise,
                pickup_date, stock_restored, requested_at, updated_at
            FROM return_requests
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Gets the return request for an order item, if one exists.
    pub async fn get_by_item(&self, order_item_id: &str) -> DbResult<Option<ReturnRequest>> {
        let request = sqlx::query_as::<_, ReturnRequest>(
            r#"
            SELECT
                id, order_item_id, user_id, reason, comments,
                image1, image2, image3, status, refund_amount_paise,
                pickup_date, stock_restored, requested_at, updated_at
            FROM return_requests
            WHERE order_item_id = ?1
            "#,
        )
        .bind(order_item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Lists a user's return requests, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<ReturnRequest>> {
        let requests = sqlx::query_as::<_, ReturnRequest>(
            r#"
            SELECT
                id, order_item_id, user_id, reason, comments,
                image1, image2, image3, status, refund_amount_paise,
                pickup_date, stock_restored, requested_at, updated_at
            FROM return_requests
            WHERE user_id = ?1
            ORDER BY requested_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }
}

// =============================================================================
// Transaction-composable mutations
// =============================================================================

/// Inserts a return request inside an open transaction.
pub async fn insert(conn: &mut SqliteConnection, request: &ReturnRequest) -> DbResult<()> {
    debug!(id = %request.id, order_item_id = %request.order_item_id, "Inserting return request");

    sqlx::query(
        r#"
        INSERT INTO return_requests (
            id, order_item_id, user_id, reason, comments,
            image1, image2, image3, status, refund_amount_paise,
            pickup_date, stock_restored, requested_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&request.id)
    .bind(&request.order_item_id)
    .bind(&request.user_id)
    .bind(&request.reason)
    .bind(&request.comments)
    .bind(&request.image1)
    .bind(&request.image2)
    .bind(&request.image3)
    .bind(request.status)
    .bind(request.refund_amount_paise)
    .bind(request.pickup_date)
    .bind(request.stock_restored)
    .bind(request.requested_at)
    .bind(request.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Updates a return request's status inside an open transaction.
pub async fn update_status(
    conn: &mut SqliteConnection,
    request_id: &str,
    status: ReturnStatus,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE return_requests
        SET status = ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(request_id)
    .bind(status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ReturnRequest", request_id));
    }

    Ok(())
}

/// Sets the courier pickup date inside an open transaction.
pub async fn set_pickup_date(
    conn: &mut SqliteConnection,
    request_id: &str,
    pickup_date: NaiveDate,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE return_requests
        SET pickup_date = ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(request_id)
    .bind(pickup_date)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ReturnRequest", request_id));
    }

    Ok(())
}

/// Flips the one-shot refund latch inside an open transaction.
///
/// Returns `true` when this call won the latch (side effects should
/// run) and `false` when the refund was already completed.
pub async fn claim_refund_latch(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE return_requests
        SET stock_restored = 1, status = ?2, updated_at = ?3
        WHERE id = ?1 AND stock_restored = 0
        "#,
    )
    .bind(request_id)
    .bind(ReturnStatus::Refunded)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
