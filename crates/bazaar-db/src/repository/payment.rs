//! # Payment Repository
//!
//! Gateway payment records, tracked independently of orders.
//!
//! A payment row is created when the client begins a gateway checkout
//! or wallet top-up, and settled (success/failed) by the verification
//! callback. Order creation and wallet credit happen only on success.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::{Payment, PaymentStatus};

/// Repository for gateway payment records.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, user_id, amount_paise,
                gateway_order_id, gateway_payment_id, gateway_signature,
                status, purpose, address_id, coupon_code, created_at
            FROM payments
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Finds a payment by the gateway's intent id.
    pub async fn get_by_gateway_order(&self, gateway_order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, user_id, amount_paise,
                gateway_order_id, gateway_payment_id, gateway_signature,
                status, purpose, address_id, coupon_code, created_at
            FROM payments
            WHERE gateway_order_id = ?1
            "#,
        )
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Inserts a new pending payment.
    pub async fn insert(&self, payment: &Payment) -> DbResult<()> {
        debug!(id = %payment.id, purpose = ?payment.purpose, "Inserting payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, amount_paise,
                gateway_order_id, gateway_payment_id, gateway_signature,
                status, purpose, address_id, coupon_code, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.user_id)
        .bind(payment.amount_paise)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_signature)
        .bind(payment.status)
        .bind(payment.purpose)
        .bind(&payment.address_id)
        .bind(&payment.coupon_code)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Transaction-composable mutations
// =============================================================================

/// Settles a pending payment as successful inside an open transaction.
///
/// Guarded on `status = 'pending'` so a replayed callback cannot settle
/// twice; the second attempt reports Conflict.
pub async fn settle_success(
    conn: &mut SqliteConnection,
    payment_id: &str,
    gateway_payment_id: &str,
    gateway_signature: &str,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = ?2, gateway_payment_id = ?3, gateway_signature = ?4
        WHERE id = ?1 AND status = ?5
        "#,
    )
    .bind(payment_id)
    .bind(PaymentStatus::Success)
    .bind(gateway_payment_id)
    .bind(gateway_signature)
    .bind(PaymentStatus::Pending)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "payment {} is not pending",
            payment_id
        )));
    }

    Ok(())
}

/// Marks a pending payment failed inside an open transaction.
pub async fn settle_failed(conn: &mut SqliteConnection, payment_id: &str) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = ?2
        WHERE id = ?1 AND status = ?3
        "#,
    )
    .bind(payment_id)
    .bind(PaymentStatus::Failed)
    .bind(PaymentStatus::Pending)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "payment {} is not pending",
            payment_id
        )));
    }

    Ok(())
}

/// Generates a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}
