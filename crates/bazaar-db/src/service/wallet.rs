//! # Wallet Service
//!
//! Balance queries, statements, and gateway-settled top-ups.
//!
//! ## Top-up Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  begin_topup(amount)     → gateway intent + pending Payment row        │
//! │  confirm_topup(callback) → verify signature                            │
//! │       │                                                                 │
//! │       ├── verified:  settle success + ledger credit (one transaction)  │
//! │       └── rejected:  settle failed, balance untouched                  │
//! │                                                                         │
//! │  A replayed callback finds the payment already settled and gets        │
//! │  a conflict instead of a second credit.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::repository::payment as payment_repo;
use crate::service::gateway::{notify_best_effort, NotificationEvent, Notifier, PaymentGateway};
use crate::service::ledger;
use bazaar_core::validation::validate_positive_amount;
use bazaar_core::{
    CoreError, Money, Payment, PaymentPurpose, PaymentStatus, Wallet, WalletTransaction,
};

/// Wallet queries and gateway top-ups.
#[derive(Debug)]
pub struct WalletService<G, N> {
    db: Database,
    gateway: G,
    notifier: N,
}

impl<G: PaymentGateway, N: Notifier> WalletService<G, N> {
    /// Creates a new WalletService.
    pub fn new(db: Database, gateway: G, notifier: N) -> Self {
        WalletService {
            db,
            gateway,
            notifier,
        }
    }

    /// Gets a user's wallet, creating an empty one on first touch.
    pub async fn wallet(&self, user_id: &str) -> ServiceResult<Wallet> {
        Ok(self.db.wallets().get_or_create(user_id).await?)
    }

    /// The user's current balance.
    pub async fn balance(&self, user_id: &str) -> ServiceResult<Money> {
        Ok(self.wallet(user_id).await?.balance())
    }

    /// The user's full ledger, oldest first.
    pub async fn statement(&self, user_id: &str) -> ServiceResult<Vec<WalletTransaction>> {
        let wallet = self.wallet(user_id).await?;
        Ok(self.db.wallets().ledger(&wallet.id).await?)
    }

    /// Starts a gateway-settled wallet top-up.
    #[instrument(skip(self))]
    pub async fn begin_topup(&self, user_id: &str, amount: Money) -> ServiceResult<Payment> {
        validate_positive_amount(amount.paise())
            .map_err(CoreError::from)
            .map_err(ServiceError::Domain)?;

        let intent = self
            .gateway
            .create_intent(amount)
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let payment = Payment {
            id: payment_repo::generate_payment_id(),
            user_id: user_id.to_string(),
            amount_paise: amount.paise(),
            gateway_order_id: Some(intent.gateway_order_id),
            gateway_payment_id: None,
            gateway_signature: None,
            status: PaymentStatus::Pending,
            purpose: PaymentPurpose::WalletTopup,
            address_id: None,
            coupon_code: None,
            created_at: Utc::now(),
        };

        self.db.payments().insert(&payment).await?;

        info!(payment_id = %payment.id, amount = payment.amount_paise, "Top-up started");
        Ok(payment)
    }

    /// Settles a top-up payment and credits the wallet on success.
    #[instrument(skip(self, gateway_signature))]
    pub async fn confirm_topup(
        &self,
        payment_id: &str,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> ServiceResult<WalletTransaction> {
        let payment = self
            .db
            .payments()
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", payment_id))?;

        if payment.status != PaymentStatus::Pending {
            return Err(ServiceError::Db(DbError::conflict(format!(
                "payment {} already settled",
                payment_id
            ))));
        }
        if payment.purpose != PaymentPurpose::WalletTopup {
            return Err(ServiceError::Db(DbError::conflict(format!(
                "payment {} is not a wallet top-up",
                payment_id
            ))));
        }

        let gateway_order_id = payment.gateway_order_id.as_deref().unwrap_or_default();
        let verified = self
            .gateway
            .verify(gateway_order_id, gateway_payment_id, gateway_signature)
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        if !verified {
            warn!(payment_id, "Top-up signature verification failed");
            let mut tx = self.db.pool().begin().await?;
            payment_repo::settle_failed(&mut *tx, payment_id).await?;
            tx.commit().await?;
            return Err(ServiceError::VerificationFailed {
                payment_id: payment_id.to_string(),
            });
        }

        let wallet = self.db.wallets().get_or_create(&payment.user_id).await?;

        let mut tx = self.db.pool().begin().await?;
        payment_repo::settle_success(&mut *tx, payment_id, gateway_payment_id, gateway_signature)
            .await?;
        let txn = ledger::credit(
            &mut *tx,
            &wallet.id,
            Money::from_paise(payment.amount_paise),
            "Wallet top-up",
        )
        .await?;
        tx.commit().await?;

        info!(payment_id, amount = payment.amount_paise, "Top-up credited");

        notify_best_effort(
            &self.notifier,
            NotificationEvent::WalletCredited {
                user_id: payment.user_id.clone(),
                amount_paise: payment.amount_paise,
            },
        )
        .await;

        Ok(txn)
    }
}
