//! # Wallet Repository
//!
//! Wallets and the append-only transaction ledger.
//!
//! ## Ledger Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Every balance change = exactly one ledger row, written in the         │
//! │  same database transaction as the balance update.                      │
//! │                                                                         │
//! │  wallets.balance_paise          ← cache                                │
//! │  wallet_transactions            ← source of truth                      │
//! │                                                                         │
//! │  Invariant (checkable by replay):                                      │
//! │    balance == Σ credits − Σ debits                                     │
//! │    row[n].balance_after == row[n+1].balance_before                     │
//! │                                                                         │
//! │  Ledger rows are never updated or deleted.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bazaar_core::{Money, TransactionKind, Wallet, WalletTransaction};

/// Repository for wallet database operations.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    /// Creates a new WalletRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    /// Gets a user's wallet, creating an empty one on first touch.
    pub async fn get_or_create(&self, user_id: &str) -> DbResult<Wallet> {
        if let Some(wallet) = self.get_by_user(user_id).await? {
            return Ok(wallet);
        }

        let now = Utc::now();
        let wallet = Wallet {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            balance_paise: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(user_id, wallet_id = %wallet.id, "Creating wallet");

        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, balance_paise, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.user_id)
        .bind(wallet.balance_paise)
        .bind(wallet.is_active)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await?;

        // Re-read in case a concurrent request created it first
        self.get_by_user(user_id)
            .await?
            .ok_or_else(|| DbError::not_found("Wallet", user_id))
    }

    /// Gets a user's wallet if it exists.
    pub async fn get_by_user(&self, user_id: &str) -> DbResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance_paise, is_active, created_at, updated_at
            FROM wallets
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Gets a wallet's ledger, oldest first.
    pub async fn ledger(&self, wallet_id: &str) -> DbResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, wallet_id, amount_paise, kind, description,
                   balance_before_paise, balance_after_paise, created_at
            FROM wallet_transactions
            WHERE wallet_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Recomputes a wallet's balance from the ledger alone.
    ///
    /// Diagnostic: the result must equal the cached `balance_paise`.
    pub async fn replay_balance(&self, wallet_id: &str) -> DbResult<i64> {
        let rows = self.ledger(wallet_id).await?;
        Ok(rows.iter().map(|t| t.signed_delta_paise()).sum())
    }
}

// =============================================================================
// Transaction-composable ledger primitives
// =============================================================================
//
// Pure storage operations on the caller's open transaction. The
// service-layer ledger (service::ledger) owns the business checks
// (positive amounts, sufficient funds) and calls down into these.

/// Reads the cached balance within the caller's transaction.
pub async fn balance_of(conn: &mut SqliteConnection, wallet_id: &str) -> DbResult<i64> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT balance_paise FROM wallets WHERE id = ?1")
            .bind(wallet_id)
            .fetch_optional(&mut *conn)
            .await?;

    balance.ok_or_else(|| DbError::not_found("Wallet", wallet_id))
}

/// Writes the ledger row and the balance cache together.
///
/// The balance update is guarded on the expected `before` value so a
/// write that raced another connection fails instead of silently
/// corrupting the cache.
pub async fn append_row(
    conn: &mut SqliteConnection,
    wallet_id: &str,
    amount: Money,
    kind: TransactionKind,
    description: &str,
    before: i64,
    after: i64,
) -> DbResult<WalletTransaction> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET balance_paise = ?2, updated_at = ?3
        WHERE id = ?1 AND balance_paise = ?4
        "#,
    )
    .bind(wallet_id)
    .bind(after)
    .bind(now)
    .bind(before)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "wallet {} balance changed concurrently",
            wallet_id
        )));
    }

    let txn = WalletTransaction {
        id: Uuid::new_v4().to_string(),
        wallet_id: wallet_id.to_string(),
        amount_paise: amount.paise(),
        kind,
        description: description.to_string(),
        balance_before_paise: before,
        balance_after_paise: after,
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (
            id, wallet_id, amount_paise, kind, description,
            balance_before_paise, balance_after_paise, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&txn.id)
    .bind(&txn.wallet_id)
    .bind(txn.amount_paise)
    .bind(txn.kind)
    .bind(&txn.description)
    .bind(txn.balance_before_paise)
    .bind(txn.balance_after_paise)
    .bind(txn.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(txn)
}
