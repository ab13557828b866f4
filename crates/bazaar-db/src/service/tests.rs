//! End-to-end flow tests against an in-memory database.
//!
//! Each test builds its own isolated database, seeds the catalog it
//! needs, and drives the services exactly the way a caller would.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::pool::{Database, DbConfig};
use crate::service::checkout::CheckoutService;
use crate::service::fulfillment::FulfillmentService;
use crate::service::gateway::{FakeGateway, RecordingNotifier};
use crate::service::returns::ReturnService;
use crate::service::wallet::WalletService;
use bazaar_core::lifecycle::UpdateOrderStatusCommand;
use bazaar_core::{
    CatalogProduct, CheckoutSession, CoreError, Coupon, DiscountKind, Money, Offer, OfferScope,
    OrderItemStatus, OrderStatus, PaymentMethod, PaymentStatus, ProductVariant, ReturnStatus,
};

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    db: Database,
    checkout: CheckoutService<FakeGateway, RecordingNotifier>,
    fulfillment: FulfillmentService<RecordingNotifier>,
    returns: ReturnService<RecordingNotifier>,
    wallet: WalletService<FakeGateway, RecordingNotifier>,
}

impl Harness {
    async fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("bazaar_db=debug")
            .with_test_writer()
            .try_init();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Harness {
            checkout: CheckoutService::new(db.clone(), FakeGateway::new(), RecordingNotifier::new()),
            fulfillment: FulfillmentService::new(db.clone(), RecordingNotifier::new()),
            returns: ReturnService::new(db.clone(), RecordingNotifier::new()),
            wallet: WalletService::new(db.clone(), FakeGateway::new(), RecordingNotifier::new()),
            db,
        }
    }

    /// Seeds one product with one variant; returns the variant id.
    async fn seed_product(
        &self,
        name: &str,
        price_paise: i64,
        subcategory: Option<&str>,
        stock: i64,
    ) -> String {
        let product_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        self.db
            .catalog()
            .insert_product(&CatalogProduct {
                id: product_id.clone(),
                name: name.to_string(),
                price_paise,
                subcategory_id: subcategory.map(String::from),
                is_active: true,
            })
            .await
            .unwrap();

        let variant_id = Uuid::new_v4().to_string();
        self.db
            .catalog()
            .insert_variant(&ProductVariant {
                id: variant_id.clone(),
                product_id,
                size: "9".to_string(),
                stock,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        variant_id
    }

    async fn seed_coupon(&self, code: &str, kind: DiscountKind, value: i64, min_paise: i64) {
        let now = Utc::now();
        self.db
            .coupons()
            .insert(&Coupon {
                id: Uuid::new_v4().to_string(),
                name: code.to_string(),
                code: code.to_string(),
                discount_kind: kind,
                discount_value: value,
                min_cart_value_paise: min_paise,
                per_user_limit: 1,
                subcategory_id: None,
                valid_from: now - Duration::days(1),
                valid_till: now + Duration::days(30),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    /// Funds a wallet through the full gateway top-up flow.
    async fn fund_wallet(&self, user_id: &str, paise: i64) {
        let payment = self
            .wallet
            .begin_topup(user_id, Money::from_paise(paise))
            .await
            .unwrap();
        self.wallet
            .confirm_topup(&payment.id, "pay_t", &FakeGateway::signature_for("pay_t"))
            .await
            .unwrap();
    }

    async fn stock_of(&self, variant_id: &str) -> i64 {
        self.db
            .catalog()
            .get_variant(variant_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    async fn balance_of(&self, user_id: &str) -> i64 {
        self.wallet.balance(user_id).await.unwrap().paise()
    }
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn wallet_order_debits_reserves_and_clears_cart() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    // ₹1200 + 18% GST, free delivery at or above ₹1000.
    assert_eq!(order.subtotal_paise, 120_000);
    assert_eq!(order.gst_paise, 21_600);
    assert_eq!(order.delivery_paise, 0);
    assert_eq!(order.total_paise, 141_600);
    assert_eq!(order.status, OrderStatus::Processing);

    assert_eq!(h.balance_of("u1").await, 200_000 - 141_600);
    assert_eq!(h.stock_of(&variant).await, 4);
    assert!(h.db.carts().lines_for_user("u1").await.unwrap().is_empty());

    let items = h.db.orders().get_items(&order.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].unit_price_paise, 120_000);
    assert_eq!(items[0].status, OrderItemStatus::Processing);
}

#[tokio::test]
async fn order_total_identity_holds() {
    let h = Harness::new().await;
    let v1 = h.seed_product("A", 35_000, None, 3).await;
    let v2 = h.seed_product("B", 27_500, None, 3).await;
    h.fund_wallet("u1", 500_000).await;
    h.db.carts().add_line("u1", &v1, 2).await.unwrap();
    h.db.carts().add_line("u1", &v2, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    assert_eq!(
        order.total_paise,
        order.subtotal_paise - order.discount_paise + order.gst_paise + order.delivery_paise
    );
}

#[tokio::test]
async fn delivery_fee_applies_below_threshold() {
    let h = Harness::new().await;
    let variant = h.seed_product("Low", 80_000, None, 5).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    // ₹800 taxable, 18% GST, ₹100 delivery.
    assert_eq!(order.gst_paise, 14_400);
    assert_eq!(order.delivery_paise, 10_000);
    assert_eq!(order.total_paise, 104_400);
}

#[tokio::test]
async fn insufficient_funds_rolls_everything_back() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let err = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::InsufficientFunds { .. })
    ));
    assert_eq!(h.stock_of(&variant).await, 5);
    assert_eq!(h.db.carts().lines_for_user("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn cod_rejected_at_limit_allowed_below() {
    let h = Harness::new().await;
    let expensive = h.seed_product("Big", 500_000, None, 5).await;
    h.db.carts().add_line("u1", &expensive, 1).await.unwrap();

    let err = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Cod)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::CodLimitExceeded { .. })
    ));

    let h = Harness::new().await;
    let cheap = h.seed_product("Small", 80_000, None, 5).await;
    h.db.carts().add_line("u1", &cheap, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Cod)
        .await
        .unwrap();

    // Nothing collected up front, order waits for acknowledgement.
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(h.balance_of("u1").await, 0);
}

#[tokio::test]
async fn empty_cart_cannot_checkout() {
    let h = Harness::new().await;
    let err = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Cod)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(CoreError::EmptyCart)));
}

#[tokio::test]
async fn sold_out_line_is_excluded_not_fatal() {
    let h = Harness::new().await;
    let gone = h.seed_product("Gone", 50_000, None, 1).await;
    let live = h.seed_product("Live", 80_000, None, 5).await;

    // u2 buys the last unit before u1 checks out.
    h.fund_wallet("u2", 200_000).await;
    h.db.carts().add_line("u2", &gone, 1).await.unwrap();
    h.db.carts().add_line("u1", &gone, 1).await.unwrap();
    h.db.carts().add_line("u1", &live, 1).await.unwrap();
    h.checkout
        .place_order(&CheckoutSession::plain("u2"), "addr-2", PaymentMethod::Wallet)
        .await
        .unwrap();

    let quote = h.checkout.quote(&CheckoutSession::plain("u1")).await.unwrap();
    assert_eq!(quote.cart.lines.len(), 1);
    assert_eq!(quote.cart.out_of_stock.len(), 1);
    assert_eq!(quote.cart.totals.subtotal.paise(), 80_000);
}

#[tokio::test]
async fn cart_quantity_caps_at_four() {
    let h = Harness::new().await;
    let variant = h.seed_product("Capped", 10_000, None, 100).await;

    h.db.carts().add_line("u1", &variant, 3).await.unwrap();
    let line = h.db.carts().add_line("u1", &variant, 3).await.unwrap();
    assert_eq!(line.quantity, 4);
}

#[tokio::test]
async fn offer_reduces_unit_price_at_placement() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 100_000, Some("sneakers"), 5).await;
    let now = Utc::now();
    h.db.catalog()
        .insert_offer(&Offer {
            id: Uuid::new_v4().to_string(),
            scope: OfferScope::Category,
            target_id: "sneakers".to_string(),
            percent_bps: 2000,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
        })
        .await
        .unwrap();
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    let items = h.db.orders().get_items(&order.id).await.unwrap();
    // 20% off ₹1000, frozen on the item.
    assert_eq!(items[0].unit_price_paise, 80_000);
    assert_eq!(order.subtotal_paise, 80_000);
}

// =============================================================================
// Coupons at checkout
// =============================================================================

#[tokio::test]
async fn coupon_applies_and_usage_increments() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.seed_coupon("FESTIVE10", DiscountKind::Percent, 1000, 100_000).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let session = CheckoutSession::with_coupon("u1", "festive10");
    let order = h
        .checkout
        .place_order(&session, "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    // 10% of ₹1200 = ₹120 off; taxable ₹1080, GST ₹194.40, free delivery.
    assert_eq!(order.discount_paise, 12_000);
    assert_eq!(order.gst_paise, 19_440);
    assert_eq!(order.total_paise, 127_440);
    assert_eq!(order.coupon_code.as_deref(), Some("FESTIVE10"));

    let coupon = h.db.coupons().find_by_code("FESTIVE10").await.unwrap().unwrap();
    assert_eq!(h.db.coupons().usage_count("u1", &coupon.id).await.unwrap(), 1);
}

#[tokio::test]
async fn unqualified_coupon_is_dropped_silently() {
    let h = Harness::new().await;
    let variant = h.seed_product("Cheap", 40_000, None, 5).await;
    h.seed_coupon("BIG50", DiscountKind::Flat, 5_000, 100_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let quote = h
        .checkout
        .quote(&CheckoutSession::with_coupon("u1", "BIG50"))
        .await
        .unwrap();

    assert!(quote.coupon.is_none());
    assert!(quote.coupon_rejection.is_some());
    assert_eq!(quote.cart.totals.discount.paise(), 0);
}

#[tokio::test]
async fn per_user_limit_blocks_second_redemption() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 10).await;
    h.seed_coupon("ONCE", DiscountKind::Flat, 5_000, 0).await;
    h.fund_wallet("u1", 500_000).await;

    let session = CheckoutSession::with_coupon("u1", "ONCE");

    h.db.carts().add_line("u1", &variant, 1).await.unwrap();
    let first = h
        .checkout
        .place_order(&session, "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    assert_eq!(first.discount_paise, 5_000);

    h.db.carts().add_line("u1", &variant, 1).await.unwrap();
    let second = h
        .checkout
        .place_order(&session, "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    assert_eq!(second.discount_paise, 0);
    assert!(second.coupon_code.is_none());
}

// =============================================================================
// Gateway checkout
// =============================================================================

#[tokio::test]
async fn gateway_checkout_places_order_after_verification() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let payment = h
        .checkout
        .begin_gateway_checkout(&CheckoutSession::plain("u1"), "addr-1")
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount_paise, 141_600);

    // No order, no reservation until the callback verifies.
    assert_eq!(h.stock_of(&variant).await, 5);

    let order = h
        .checkout
        .confirm_gateway_payment(&payment.id, "pay_1", &FakeGateway::signature_for("pay_1"))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment_method, PaymentMethod::Gateway);
    assert_eq!(h.stock_of(&variant).await, 4);

    let settled = h.db.payments().get_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Success);

    // Replayed callback cannot settle twice.
    let replay = h
        .checkout
        .confirm_gateway_payment(&payment.id, "pay_1", &FakeGateway::signature_for("pay_1"))
        .await;
    assert!(replay.is_err());
}

#[tokio::test]
async fn failed_verification_leaves_no_order() {
    let h = Harness::new().await;
    let declining = CheckoutService::new(
        h.db.clone(),
        FakeGateway::declining(),
        RecordingNotifier::new(),
    );
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let payment = declining
        .begin_gateway_checkout(&CheckoutSession::plain("u1"), "addr-1")
        .await
        .unwrap();

    let err = declining
        .confirm_gateway_payment(&payment.id, "pay_1", &FakeGateway::signature_for("pay_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::VerificationFailed { .. }));

    assert_eq!(h.stock_of(&variant).await, 5);
    assert_eq!(h.db.carts().lines_for_user("u1").await.unwrap().len(), 1);
    let settled = h.db.payments().get_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn repriced_cart_fails_the_settlement() {
    let h = Harness::new().await;
    let v1 = h.seed_product("Runner", 120_000, None, 5).await;
    let v2 = h.seed_product("Extra", 50_000, None, 5).await;
    h.db.carts().add_line("u1", &v1, 1).await.unwrap();

    let payment = h
        .checkout
        .begin_gateway_checkout(&CheckoutSession::plain("u1"), "addr-1")
        .await
        .unwrap();

    // Cart changes between intent and settlement.
    h.db.carts().add_line("u1", &v2, 1).await.unwrap();

    let err = h
        .checkout
        .confirm_gateway_payment(&payment.id, "pay_1", &FakeGateway::signature_for("pay_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AmountMismatch { .. }));

    let settled = h.db.payments().get_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PaymentStatus::Failed);
}

// =============================================================================
// Wallet top-up
// =============================================================================

#[tokio::test]
async fn topup_credits_wallet_once() {
    let h = Harness::new().await;

    let payment = h
        .wallet
        .begin_topup("u1", Money::from_paise(50_000))
        .await
        .unwrap();
    let txn = h
        .wallet
        .confirm_topup(&payment.id, "pay_1", &FakeGateway::signature_for("pay_1"))
        .await
        .unwrap();

    assert_eq!(txn.amount_paise, 50_000);
    assert_eq!(txn.balance_before_paise, 0);
    assert_eq!(txn.balance_after_paise, 50_000);
    assert_eq!(h.balance_of("u1").await, 50_000);

    let replay = h
        .wallet
        .confirm_topup(&payment.id, "pay_1", &FakeGateway::signature_for("pay_1"))
        .await;
    assert!(replay.is_err());
    assert_eq!(h.balance_of("u1").await, 50_000);
}

#[tokio::test]
async fn topup_rejects_non_positive_amounts() {
    let h = Harness::new().await;
    let err = h.wallet.begin_topup("u1", Money::zero()).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn ledger_replays_to_cached_balance() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 80_000, None, 5).await;
    h.fund_wallet("u1", 300_000).await;

    h.db.carts().add_line("u1", &variant, 1).await.unwrap();
    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    h.fulfillment.cancel_order(&order.id, "Changed my mind").await.unwrap();

    let wallet = h.wallet.wallet("u1").await.unwrap();
    let replayed = h.db.wallets().replay_balance(&wallet.id).await.unwrap();
    assert_eq!(replayed, wallet.balance_paise);

    // Adjacent rows chain: each balance_after feeds the next before.
    let ledger = h.db.wallets().ledger(&wallet.id).await.unwrap();
    assert_eq!(ledger.len(), 3);
    for pair in ledger.windows(2) {
        assert_eq!(pair[0].balance_after_paise, pair[1].balance_before_paise);
    }
}

// =============================================================================
// Fulfillment
// =============================================================================

#[tokio::test]
async fn status_updates_cascade_to_items() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();
    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    let shipped = h
        .fulfillment
        .update_status(UpdateOrderStatusCommand {
            order_id: order.id.clone(),
            new_status: OrderStatus::Shipped,
        })
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let delivered = h
        .fulfillment
        .update_status(UpdateOrderStatusCommand {
            order_id: order.id.clone(),
            new_status: OrderStatus::Delivered,
        })
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.delivered_at.is_some());

    let items = h.db.orders().get_items(&order.id).await.unwrap();
    assert!(items.iter().all(|i| i.status == OrderItemStatus::Delivered));

    // Delivered orders cannot be cancelled at order level.
    let err = h
        .fulfillment
        .update_status(UpdateOrderStatusCommand {
            order_id: order.id.clone(),
            new_status: OrderStatus::Cancelled,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::InvalidOrderTransition { .. })
    ));
}

#[tokio::test]
async fn cancelling_prepaid_order_refunds_and_restocks() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 120_000, None, 5).await;
    h.seed_coupon("TEN", DiscountKind::Percent, 1000, 0).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(
            &CheckoutSession::with_coupon("u1", "TEN"),
            "addr-1",
            PaymentMethod::Wallet,
        )
        .await
        .unwrap();
    let balance_after_purchase = h.balance_of("u1").await;
    let coupon = h.db.coupons().find_by_code("TEN").await.unwrap().unwrap();
    assert_eq!(h.db.coupons().usage_count("u1", &coupon.id).await.unwrap(), 1);

    let cancelled = h
        .fulfillment
        .cancel_order(&order.id, "Ordered by mistake")
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("Ordered by mistake"));
    assert_eq!(h.stock_of(&variant).await, 5);
    assert_eq!(h.balance_of("u1").await, balance_after_purchase + order.total_paise);
    // The redemption is handed back with the cancellation.
    assert_eq!(h.db.coupons().usage_count("u1", &coupon.id).await.unwrap(), 0);

    // The row reflects the cancelled state: zero totals, coupon
    // snapshot gone.
    assert_eq!(cancelled.subtotal_paise, 0);
    assert_eq!(cancelled.discount_paise, 0);
    assert_eq!(cancelled.gst_paise, 0);
    assert_eq!(cancelled.delivery_paise, 0);
    assert_eq!(cancelled.total_paise, 0);
    assert!(cancelled.coupon_id.is_none());
    assert!(cancelled.coupon_code.is_none());
}

#[tokio::test]
async fn cancelling_cod_order_restocks_without_refund() {
    let h = Harness::new().await;
    let variant = h.seed_product("Runner", 80_000, None, 5).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Cod)
        .await
        .unwrap();
    h.fulfillment.cancel_order(&order.id, "No longer needed").await.unwrap();

    assert_eq!(h.stock_of(&variant).await, 5);
    assert_eq!(h.balance_of("u1").await, 0);
}

#[tokio::test]
async fn item_cancel_reprices_and_refunds_the_delta() {
    let h = Harness::new().await;
    let keep = h.seed_product("Keep", 60_000, None, 5).await;
    let spare = h.seed_product("Drop", 50_000, None, 5).await;
    h.fund_wallet("u1", 300_000).await;
    h.db.carts().add_line("u1", &keep, 1).await.unwrap();
    h.db.carts().add_line("u1", &spare, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    // ₹1100 subtotal, GST ₹198, free delivery: ₹1298.
    assert_eq!(order.total_paise, 129_800);
    let balance_after_purchase = h.balance_of("u1").await;

    let items = h.db.orders().get_items(&order.id).await.unwrap();
    let dropped = items.iter().find(|i| i.variant_id == spare).unwrap();

    let updated = h.fulfillment.cancel_item(&order.id, &dropped.id).await.unwrap();

    // ₹600 left: GST ₹108, delivery fee returns below ₹1000 → ₹808.
    assert_eq!(updated.subtotal_paise, 60_000);
    assert_eq!(updated.gst_paise, 10_800);
    assert_eq!(updated.delivery_paise, 10_000);
    assert_eq!(updated.total_paise, 80_800);

    assert_eq!(h.stock_of(&spare).await, 5);
    assert_eq!(h.stock_of(&keep).await, 4);
    assert_eq!(
        h.balance_of("u1").await,
        balance_after_purchase + (129_800 - 80_800)
    );

    // The surviving item is untouched.
    let items = h.db.orders().get_items(&order.id).await.unwrap();
    let kept = items.iter().find(|i| i.variant_id == keep).unwrap();
    assert_eq!(kept.status, OrderItemStatus::Processing);

    let summary = h.db.orders().summary(&order.id).await.unwrap().unwrap();
    assert_eq!(summary.live_items_total().paise(), 60_000);
    assert_eq!(summary.items.len(), 2);
}

#[tokio::test]
async fn item_cancel_below_coupon_minimum_forfeits_discount() {
    let h = Harness::new().await;
    let keep = h.seed_product("Keep", 60_000, None, 5).await;
    let spare = h.seed_product("Drop", 50_000, None, 5).await;
    h.seed_coupon("MIN1000", DiscountKind::Flat, 5_000, 100_000).await;
    h.fund_wallet("u1", 300_000).await;
    h.db.carts().add_line("u1", &keep, 1).await.unwrap();
    h.db.carts().add_line("u1", &spare, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(
            &CheckoutSession::with_coupon("u1", "MIN1000"),
            "addr-1",
            PaymentMethod::Wallet,
        )
        .await
        .unwrap();
    assert_eq!(order.discount_paise, 5_000);

    let items = h.db.orders().get_items(&order.id).await.unwrap();
    let dropped = items.iter().find(|i| i.variant_id == spare).unwrap();
    let updated = h.fulfillment.cancel_item(&order.id, &dropped.id).await.unwrap();

    // ₹600 < ₹1000 minimum: coupon gone, no discount on what remains.
    assert_eq!(updated.discount_paise, 0);
    assert!(updated.coupon_id.is_none());
    assert!(updated.coupon_code.is_none());
}

#[tokio::test]
async fn cancelling_last_item_collapses_the_order() {
    let h = Harness::new().await;
    let variant = h.seed_product("Only", 80_000, None, 5).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    let items = h.db.orders().get_items(&order.id).await.unwrap();

    let updated = h.fulfillment.cancel_item(&order.id, &items[0].id).await.unwrap();

    assert_eq!(updated.status, OrderStatus::Cancelled);
    assert_eq!(h.stock_of(&variant).await, 5);
    assert_eq!(h.balance_of("u1").await, 200_000);

    // Nothing remains to charge for: every money column collapses to 0.
    assert_eq!(updated.subtotal_paise, 0);
    assert_eq!(updated.discount_paise, 0);
    assert_eq!(updated.gst_paise, 0);
    assert_eq!(updated.delivery_paise, 0);
    assert_eq!(updated.total_paise, 0);
}

#[tokio::test]
async fn item_cancel_is_not_reapplied_on_retry() {
    let h = Harness::new().await;
    let keep = h.seed_product("Keep", 60_000, None, 5).await;
    let spare = h.seed_product("Drop", 50_000, None, 5).await;
    h.fund_wallet("u1", 300_000).await;
    h.db.carts().add_line("u1", &keep, 1).await.unwrap();
    h.db.carts().add_line("u1", &spare, 1).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    let items = h.db.orders().get_items(&order.id).await.unwrap();
    let dropped = items.iter().find(|i| i.variant_id == spare).unwrap();

    h.fulfillment.cancel_item(&order.id, &dropped.id).await.unwrap();
    let balance = h.balance_of("u1").await;

    let err = h.fulfillment.cancel_item(&order.id, &dropped.id).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::ItemAlreadyCancelled { .. })
    ));
    assert_eq!(h.balance_of("u1").await, balance);
    assert_eq!(h.stock_of(&spare).await, 5);
}

// =============================================================================
// Returns
// =============================================================================

/// Places and delivers a one-line order; returns (order_id, item_id,
/// variant_id).
async fn delivered_order(h: &Harness, price_paise: i64, quantity: i64) -> (String, String, String) {
    let variant = h.seed_product("Returnable", price_paise, None, 10).await;
    h.fund_wallet("u1", 1_000_000).await;
    h.db.carts().add_line("u1", &variant, quantity).await.unwrap();

    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();

    for status in [OrderStatus::Shipped, OrderStatus::Delivered] {
        h.fulfillment
            .update_status(UpdateOrderStatusCommand {
                order_id: order.id.clone(),
                new_status: status,
            })
            .await
            .unwrap();
    }

    let items = h.db.orders().get_items(&order.id).await.unwrap();
    (order.id.clone(), items[0].id.clone(), variant)
}

#[tokio::test]
async fn return_flow_refunds_with_gst_exactly_once() {
    let h = Harness::new().await;
    let (_, item_id, variant) = delivered_order(&h, 30_000, 2).await;
    let balance_before = h.balance_of("u1").await;
    let stock_before = h.stock_of(&variant).await;

    let request = h
        .returns
        .request_return("u1", &item_id, "Wrong size", None, &[])
        .await
        .unwrap();
    // ₹600 × 1.18 = ₹708, frozen at request time.
    assert_eq!(request.refund_amount_paise, 70_800);
    assert_eq!(request.status, ReturnStatus::Requested);

    h.returns.approve(&request.id).await.unwrap();
    h.returns
        .schedule_pickup(&request.id, Utc::now().date_naive() + Duration::days(2))
        .await
        .unwrap();
    let picked = h.returns.mark_picked_up(&request.id).await.unwrap();
    assert_eq!(picked.status, ReturnStatus::PickedUp);

    let item = h.db.orders().get_item(&item_id).await.unwrap().unwrap();
    assert_eq!(item.status, OrderItemStatus::Returned);

    h.returns.initiate_refund(&request.id).await.unwrap();
    let refunded = h.returns.complete_refund(&request.id).await.unwrap();

    assert_eq!(refunded.status, ReturnStatus::Refunded);
    assert!(refunded.stock_restored);
    assert_eq!(h.balance_of("u1").await, balance_before + 70_800);
    assert_eq!(h.stock_of(&variant).await, stock_before + 2);

    let item = h.db.orders().get_item(&item_id).await.unwrap().unwrap();
    assert_eq!(item.status, OrderItemStatus::Refunded);

    // Completing again is a no-op: no second credit, no second restock.
    let again = h.returns.complete_refund(&request.id).await.unwrap();
    assert_eq!(again.status, ReturnStatus::Refunded);
    assert_eq!(h.balance_of("u1").await, balance_before + 70_800);
    assert_eq!(h.stock_of(&variant).await, stock_before + 2);
}

#[tokio::test]
async fn return_requires_a_delivered_order() {
    let h = Harness::new().await;
    let variant = h.seed_product("Fresh", 80_000, None, 5).await;
    h.fund_wallet("u1", 200_000).await;
    h.db.carts().add_line("u1", &variant, 1).await.unwrap();
    let order = h
        .checkout
        .place_order(&CheckoutSession::plain("u1"), "addr-1", PaymentMethod::Wallet)
        .await
        .unwrap();
    let items = h.db.orders().get_items(&order.id).await.unwrap();

    let err = h
        .returns
        .request_return("u1", &items[0].id, "Too slow", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::OrderNotDelivered { .. })
    ));
}

#[tokio::test]
async fn return_window_expires_after_ten_days() {
    let h = Harness::new().await;
    let (order_id, item_id, _) = delivered_order(&h, 30_000, 1).await;

    // Backdate the delivery past the window.
    let old = Utc::now() - Duration::days(11);
    sqlx::query("UPDATE orders SET delivered_at = ?2 WHERE id = ?1")
        .bind(&order_id)
        .bind(old)
        .execute(h.db.pool())
        .await
        .unwrap();

    let err = h
        .returns
        .request_return("u1", &item_id, "Changed my mind", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::ReturnWindowExpired { .. })
    ));
}

#[tokio::test]
async fn second_return_request_for_same_item_is_rejected() {
    let h = Harness::new().await;
    let (_, item_id, _) = delivered_order(&h, 30_000, 1).await;

    h.returns
        .request_return("u1", &item_id, "Wrong size", None, &[])
        .await
        .unwrap();
    let err = h
        .returns
        .request_return("u1", &item_id, "Wrong size again", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Domain(CoreError::DuplicateReturnRequest { .. })
    ));
}

#[tokio::test]
async fn declined_return_moves_no_money_or_stock() {
    let h = Harness::new().await;
    let (_, item_id, variant) = delivered_order(&h, 30_000, 1).await;
    let balance = h.balance_of("u1").await;
    let stock = h.stock_of(&variant).await;

    let request = h
        .returns
        .request_return(
            "u1",
            &item_id,
            "Damaged",
            Some("Sole split after a day".to_string()),
            &["img-a.jpg".to_string(), "img-b.jpg".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(request.image1.as_deref(), Some("img-a.jpg"));
    assert_eq!(request.image2.as_deref(), Some("img-b.jpg"));
    assert!(request.image3.is_none());

    let declined = h.returns.decline(&request.id).await.unwrap();
    assert_eq!(declined.status, ReturnStatus::Declined);

    assert_eq!(h.balance_of("u1").await, balance);
    assert_eq!(h.stock_of(&variant).await, stock);

    // Terminal: nothing moves a declined request.
    assert!(h.returns.approve(&request.id).await.is_err());
}

#[tokio::test]
async fn return_request_validates_input() {
    let h = Harness::new().await;
    let (_, item_id, _) = delivered_order(&h, 30_000, 1).await;

    let err = h
        .returns
        .request_return("u1", &item_id, "", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(CoreError::Validation(_))));

    let too_many: Vec<String> = (0..4).map(|i| format!("img-{i}.jpg")).collect();
    let err = h
        .returns
        .request_return("u1", &item_id, "Damaged", None, &too_many)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Domain(CoreError::Validation(_))));
}

#[tokio::test]
async fn someone_elses_item_cannot_be_returned() {
    let h = Harness::new().await;
    let (_, item_id, _) = delivered_order(&h, 30_000, 1).await;

    let err = h
        .returns
        .request_return("intruder", &item_id, "Not mine", None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Db(_)));
}
