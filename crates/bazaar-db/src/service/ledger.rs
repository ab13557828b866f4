//! # Wallet Ledger Operations
//!
//! Credit and debit on the caller's open transaction, with the business
//! checks the storage primitives in `repository::wallet` deliberately
//! leave out.
//!
//! ## Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  credit(amount)   amount must be positive                              │
//! │  debit(amount)    amount must be positive AND covered by the balance   │
//! │                                                                         │
//! │  Either failure propagates as a domain error and rolls back the        │
//! │  caller's whole transaction (order placement, refund, top-up).         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::repository::wallet as wallet_repo;
use bazaar_core::{CoreError, Money, TransactionKind, ValidationError, WalletTransaction};

/// Credits a wallet inside an open transaction.
///
/// Appends the ledger row and updates the cached balance atomically
/// with whatever else the caller's transaction does (refunds, top-ups).
pub async fn credit(
    conn: &mut SqliteConnection,
    wallet_id: &str,
    amount: Money,
    description: &str,
) -> ServiceResult<WalletTransaction> {
    check_positive(amount)?;

    let before = wallet_repo::balance_of(conn, wallet_id).await?;
    let after = before + amount.paise();
    let txn = wallet_repo::append_row(
        conn,
        wallet_id,
        amount,
        TransactionKind::Credit,
        description,
        before,
        after,
    )
    .await?;

    debug!(wallet_id, amount = %amount, "Wallet credited");
    Ok(txn)
}

/// Debits a wallet inside an open transaction.
///
/// Fails with `InsufficientFunds` (rolling back the caller's
/// transaction) when the balance does not cover `amount`.
pub async fn debit(
    conn: &mut SqliteConnection,
    wallet_id: &str,
    amount: Money,
    description: &str,
) -> ServiceResult<WalletTransaction> {
    check_positive(amount)?;

    let before = wallet_repo::balance_of(conn, wallet_id).await?;
    if before < amount.paise() {
        return Err(ServiceError::Domain(CoreError::InsufficientFunds {
            balance_paise: before,
            required_paise: amount.paise(),
        }));
    }

    let after = before - amount.paise();
    let txn = wallet_repo::append_row(
        conn,
        wallet_id,
        amount,
        TransactionKind::Debit,
        description,
        before,
        after,
    )
    .await?;

    debug!(wallet_id, amount = %amount, "Wallet debited");
    Ok(txn)
}

fn check_positive(amount: Money) -> ServiceResult<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ServiceError::Domain(CoreError::Validation(
            ValidationError::MustBePositive {
                field: "amount".to_string(),
            },
        )))
    }
}
