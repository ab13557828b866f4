//! # Checkout Service
//!
//! Quoting and order placement.
//!
//! ## Placement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  place_order (one transaction)                          │
//! │                                                                         │
//! │  1. Quote the cart (offers, coupon re-validation, totals)              │
//! │  2. BEGIN                                                              │
//! │  3. Wallet payment? debit the wallet first                             │
//! │  4. Reserve stock per line (guarded decrement)                         │
//! │  5. Insert order + items with frozen names and prices                  │
//! │  6. Clear the cart                                                     │
//! │  7. Coupon applied? increment the usage counter                        │
//! │  8. COMMIT                                                             │
//! │                                                                         │
//! │  Any failure between 2 and 8 rolls everything back: no order,          │
//! │  no debit, no reservation, cart intact.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Gateway Flow
//! Gateway-settled checkouts create a pending [`Payment`] first and run
//! the placement transaction only inside `confirm_gateway_payment`,
//! after signature verification. An unverified callback, an amount
//! mismatch, or a failed placement all leave the payment `failed` and
//! the cart untouched.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::repository::{cart, catalog, coupon as coupon_repo, order as order_repo, payment as payment_repo};
use crate::service::gateway::{notify_best_effort, NotificationEvent, Notifier, PaymentGateway};
use crate::service::ledger;
use bazaar_core::coupon::evaluate;
use bazaar_core::pricing::{price_cart, PricedCart};
use bazaar_core::{
    CheckoutSession, CoreError, Coupon, CouponRejection, Money, Order, OrderItem,
    OrderItemStatus, OrderStatus, Payment, PaymentMethod, PaymentPurpose, PaymentStatus,
};

/// A priced cart plus the coupon outcome for this checkout.
#[derive(Debug, Clone)]
pub struct CheckoutQuote {
    pub cart: PricedCart,
    /// The coupon actually applied, after re-validation.
    pub coupon: Option<Coupon>,
    /// Why the claimed coupon was dropped, when it was.
    pub coupon_rejection: Option<CouponRejection>,
}

impl CheckoutQuote {
    /// The amount the customer pays for this quote.
    pub fn grand_total(&self) -> Money {
        self.cart.totals.grand_total
    }
}

/// Order placement and gateway checkout coordination.
#[derive(Debug)]
pub struct CheckoutService<G, N> {
    db: Database,
    gateway: G,
    notifier: N,
}

impl<G: PaymentGateway, N: Notifier> CheckoutService<G, N> {
    /// Creates a new CheckoutService.
    pub fn new(db: Database, gateway: G, notifier: N) -> Self {
        CheckoutService {
            db,
            gateway,
            notifier,
        }
    }

    /// Prices the user's cart and re-validates any claimed coupon.
    ///
    /// A coupon that no longer qualifies is dropped silently: the quote
    /// carries the rejection reason but still succeeds at full price.
    pub async fn quote(&self, session: &CheckoutSession) -> ServiceResult<CheckoutQuote> {
        let views = self.db.carts().view_for_user(&session.user_id).await?;
        let offers = self.db.catalog().active_offers().await?;
        let now = Utc::now();

        // First pass without a discount establishes the subtotal the
        // coupon rules evaluate against.
        let undiscounted = price_cart(&views, &offers, Money::zero(), now);

        let claimed = match &session.coupon_code {
            Some(code) => self.db.coupons().find_by_code(code).await?,
            None => None,
        };

        let used_count = match &claimed {
            Some(c) => {
                self.db
                    .coupons()
                    .usage_count(&session.user_id, &c.id)
                    .await?
            }
            None => 0,
        };

        // A claimed code that matched nothing must still reject, so the
        // quote can report InvalidCoupon rather than pretending no
        // coupon was asked for.
        let outcome = if session.coupon_code.is_some() {
            Some(evaluate(
                claimed.as_ref(),
                undiscounted.totals.subtotal,
                &undiscounted.lines,
                used_count,
                now.date_naive(),
            ))
        } else {
            None
        };

        let (cart, coupon, coupon_rejection) = match outcome {
            Some(Ok(discount)) => {
                let cart = price_cart(&views, &offers, discount, now);
                (cart, claimed, None)
            }
            Some(Err(rejection)) => (undiscounted, None, Some(rejection)),
            None => (undiscounted, None, None),
        };

        Ok(CheckoutQuote {
            cart,
            coupon,
            coupon_rejection,
        })
    }

    /// Places an order paid by wallet or cash on delivery.
    ///
    /// Gateway payments must go through [`Self::begin_gateway_checkout`].
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn place_order(
        &self,
        session: &CheckoutSession,
        address_id: &str,
        method: PaymentMethod,
    ) -> ServiceResult<Order> {
        if method == PaymentMethod::Gateway {
            return Err(ServiceError::GatewayFlowRequired);
        }

        let quote = self.quote(session).await?;
        if quote.cart.is_empty() {
            return Err(ServiceError::Domain(CoreError::EmptyCart));
        }

        if method == PaymentMethod::Cod {
            bazaar_core::lifecycle::check_cod_allowed(quote.grand_total())
                .map_err(ServiceError::Domain)?;
        }

        // Wallet lookup happens before the transaction; creation is
        // idempotent.
        let wallet = match method {
            PaymentMethod::Wallet => Some(self.db.wallets().get_or_create(&session.user_id).await?),
            _ => None,
        };

        let mut tx = self.db.pool().begin().await?;

        if let Some(wallet) = &wallet {
            ledger::debit(
                &mut *tx,
                &wallet.id,
                quote.grand_total(),
                "Order payment",
            )
            .await?;
        }

        let order = place_in_tx(&mut *tx, &quote, session, address_id, method).await?;

        tx.commit().await?;

        info!(order_code = %order.order_code, total = order.total_paise, "Order placed");

        notify_best_effort(
            &self.notifier,
            NotificationEvent::OrderPlaced {
                user_id: order.user_id.clone(),
                order_code: order.order_code.clone(),
                total_paise: order.total_paise,
            },
        )
        .await;

        Ok(order)
    }

    /// Starts a gateway-settled checkout: quotes the cart and creates a
    /// pending payment carrying the checkout context.
    ///
    /// No order exists and no stock is reserved until the settlement
    /// callback verifies.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn begin_gateway_checkout(
        &self,
        session: &CheckoutSession,
        address_id: &str,
    ) -> ServiceResult<Payment> {
        let quote = self.quote(session).await?;
        if quote.cart.is_empty() {
            return Err(ServiceError::Domain(CoreError::EmptyCart));
        }

        let intent = self
            .gateway
            .create_intent(quote.grand_total())
            .await
            .map_err(|e| ServiceError::Gateway(e.to_string()))?;

        let payment = Payment {
            id: payment_repo::generate_payment_id(),
            user_id: session.user_id.clone(),
            amount_paise: quote.grand_total().paise(),
            gateway_order_id: Some(intent.gateway_order_id),
            gateway_payment_id: None,
            gateway_signature: None,
            status: PaymentStatus::Pending,
            purpose: PaymentPurpose::OrderPayment,
            address_id: Some(address_id.to_string()),
            coupon_code: quote.coupon.as_ref().map(|c| c.code.clone()),
            created_at: Utc::now(),
        };

        self.db.payments().insert(&payment).await?;

        info!(payment_id = %payment.id, amount = payment.amount_paise, "Gateway checkout started");
        Ok(payment)
    }

    /// Settles a gateway payment and, on success, places the order.
    ///
    /// The cart is re-quoted at settlement time; if its total no longer
    /// matches the paid amount the payment is marked failed and nothing
    /// is placed.
    #[instrument(skip(self, gateway_signature))]
    pub async fn confirm_gateway_payment(
        &self,
        payment_id: &str,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> ServiceResult<Order> {
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
        if payment.purpose != PaymentPurpose::OrderPayment {
            return Err(ServiceError::Db(DbError::conflict(format!(
                "payment {} is not an order payment",
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
            warn!(payment_id, "Gateway signature verification failed");
            self.fail_payment(payment_id).await?;
            return Err(ServiceError::VerificationFailed {
                payment_id: payment_id.to_string(),
            });
        }

        let session = match &payment.coupon_code {
            Some(code) => CheckoutSession::with_coupon(payment.user_id.clone(), code.clone()),
            None => CheckoutSession::plain(payment.user_id.clone()),
        };
        let quote = self.quote(&session).await?;

        if quote.cart.is_empty() {
            self.fail_payment(payment_id).await?;
            return Err(ServiceError::Domain(CoreError::EmptyCart));
        }
        if quote.grand_total().paise() != payment.amount_paise {
            warn!(
                payment_id,
                expected = quote.grand_total().paise(),
                paid = payment.amount_paise,
                "Cart repriced between intent and settlement"
            );
            self.fail_payment(payment_id).await?;
            return Err(ServiceError::AmountMismatch {
                expected_paise: quote.grand_total().paise(),
                paid_paise: payment.amount_paise,
            });
        }

        let address_id = payment
            .address_id
            .clone()
            .ok_or_else(|| DbError::conflict("order payment without an address"))?;

        let mut tx = self.db.pool().begin().await?;

        payment_repo::settle_success(&mut *tx, payment_id, gateway_payment_id, gateway_signature)
            .await?;

        let order = place_in_tx(&mut *tx, &quote, &session, &address_id, PaymentMethod::Gateway)
            .await?;

        tx.commit().await?;

        info!(order_code = %order.order_code, "Gateway order placed");

        notify_best_effort(
            &self.notifier,
            NotificationEvent::OrderPlaced {
                user_id: order.user_id.clone(),
                order_code: order.order_code.clone(),
                total_paise: order.total_paise,
            },
        )
        .await;

        Ok(order)
    }

    /// Marks a pending payment failed in its own small transaction.
    async fn fail_payment(&self, payment_id: &str) -> ServiceResult<()> {
        let mut tx = self.db.pool().begin().await?;
        payment_repo::settle_failed(&mut *tx, payment_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Placement internals
// =============================================================================

/// Reserves stock, writes the order and its items, clears the cart, and
/// records coupon usage - all on the caller's open transaction.
///
/// Prepaid orders start `Processing`; COD starts `Pending` until cash
/// is acknowledged.
async fn place_in_tx(
    conn: &mut SqliteConnection,
    quote: &CheckoutQuote,
    session: &CheckoutSession,
    address_id: &str,
    method: PaymentMethod,
) -> ServiceResult<Order> {
    for line in &quote.cart.lines {
        match catalog::reserve_stock(conn, &line.variant_id, line.quantity).await {
            Ok(()) => {}
            Err(DbError::Conflict { .. }) => {
                let available: i64 = sqlx::query_scalar(
                    "SELECT stock FROM product_variants WHERE id = ?1",
                )
                .bind(&line.variant_id)
                .fetch_optional(&mut *conn)
                .await?
                .unwrap_or(0);

                return Err(ServiceError::Domain(CoreError::InsufficientStock {
                    variant_id: line.variant_id.clone(),
                    available,
                    requested: line.quantity,
                }));
            }
            Err(other) => return Err(other.into()),
        }
    }

    let now = Utc::now();
    let status = if method.is_prepaid() {
        OrderStatus::Processing
    } else {
        OrderStatus::Pending
    };
    let item_status = if method.is_prepaid() {
        OrderItemStatus::Processing
    } else {
        OrderItemStatus::Pending
    };

    let totals = &quote.cart.totals;
    let order = Order {
        id: order_repo::generate_order_id(),
        order_code: order_repo::generate_order_code(),
        user_id: session.user_id.clone(),
        address_id: address_id.to_string(),
        subtotal_paise: totals.subtotal.paise(),
        discount_paise: totals.discount.paise(),
        gst_paise: totals.gst.paise(),
        delivery_paise: totals.delivery.paise(),
        total_paise: totals.grand_total.paise(),
        status,
        payment_method: method,
        coupon_id: quote.coupon.as_ref().map(|c| c.id.clone()),
        coupon_code: quote.coupon.as_ref().map(|c| c.code.clone()),
        cancel_reason: None,
        delivered_at: None,
        created_at: now,
        updated_at: now,
    };

    order_repo::insert_order(conn, &order).await?;

    for line in &quote.cart.lines {
        let item = OrderItem {
            id: order_repo::generate_item_id(),
            order_id: order.id.clone(),
            variant_id: line.variant_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price_paise: line.unit_price.paise(),
            status: item_status,
            created_at: now,
        };
        order_repo::insert_item(conn, &item).await?;
    }

    cart::clear_cart(conn, &session.user_id).await?;

    if let Some(coupon) = &quote.coupon {
        coupon_repo::increment_usage(conn, &session.user_id, &coupon.id).await?;
    }

    Ok(order)
}
