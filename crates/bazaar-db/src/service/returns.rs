//! # Return Service
//!
//! The post-delivery return workflow, from request to refund.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Requested → Approved → PickupScheduled → PickedUp                     │
//! │      │           │            │              │                          │
//! │      └───────────┴────────────┴──────────────┤                          │
//! │                                              ▼                          │
//! │                       RefundInitiated → Refunded (terminal)            │
//! │                             │                                           │
//! │        Declined (terminal) ◄┘  ...reachable from any earlier state     │
//! │                                                                         │
//! │  Refunded side effects (wallet credit + stock restore) run exactly     │
//! │  once, behind the stock_restored latch. The refund amount, frozen      │
//! │  at request time, is paid regardless of how the order was paid -       │
//! │  COD returns land in the wallet too.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{DbError, ServiceError, ServiceResult};
use crate::pool::Database;
use crate::repository::{catalog, order as order_repo, returns as return_repo};
use crate::service::gateway::{notify_best_effort, NotificationEvent, Notifier};
use crate::service::ledger;
use bazaar_core::returns::{calculate_refund, check_return_eligibility, check_return_transition};
use bazaar_core::validation::{validate_reason, validate_return_images};
use bazaar_core::{CoreError, OrderItemStatus, ReturnRequest, ReturnStatus};

/// Return-request intake and workflow transitions.
#[derive(Debug)]
pub struct ReturnService<N> {
    db: Database,
    notifier: N,
}

impl<N: Notifier> ReturnService<N> {
    /// Creates a new ReturnService.
    pub fn new(db: Database, notifier: N) -> Self {
        ReturnService { db, notifier }
    }

    /// Files a return request for a delivered order item.
    ///
    /// The refund amount is computed and frozen here; later coupon or
    /// price changes never affect it. At most 3 image attachments.
    #[instrument(skip(self, reason, comments, images))]
    pub async fn request_return(
        &self,
        user_id: &str,
        order_item_id: &str,
        reason: &str,
        comments: Option<String>,
        images: &[String],
    ) -> ServiceResult<ReturnRequest> {
        validate_reason(reason).map_err(CoreError::from).map_err(ServiceError::Domain)?;
        validate_return_images(images)
            .map_err(CoreError::from)
            .map_err(ServiceError::Domain)?;

        let item = self
            .db
            .orders()
            .get_item(order_item_id)
            .await?
            .ok_or_else(|| DbError::not_found("OrderItem", order_item_id))?;

        let order = self
            .db
            .orders()
            .get_by_id(&item.order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", &item.order_id))?;

        // Items are addressed through their owner's orders only.
        if order.user_id != user_id {
            return Err(DbError::not_found("OrderItem", order_item_id).into());
        }

        if self.db.returns().get_by_item(order_item_id).await?.is_some() {
            return Err(ServiceError::Domain(CoreError::DuplicateReturnRequest {
                item_id: order_item_id.to_string(),
            }));
        }

        let now = Utc::now();
        check_return_eligibility(order.status, order.delivered_at, &item, now.date_naive())
            .map_err(ServiceError::Domain)?;

        let mut image_slots = images.iter().cloned();
        let request = ReturnRequest {
            id: Uuid::new_v4().to_string(),
            order_item_id: order_item_id.to_string(),
            user_id: user_id.to_string(),
            reason: reason.to_string(),
            comments,
            image1: image_slots.next(),
            image2: image_slots.next(),
            image3: image_slots.next(),
            status: ReturnStatus::Requested,
            refund_amount_paise: calculate_refund(&item).paise(),
            pickup_date: None,
            stock_restored: false,
            requested_at: now,
            updated_at: now,
        };

        let mut tx = self.db.pool().begin().await?;
        match return_repo::insert(&mut *tx, &request).await {
            Ok(()) => {}
            // Two submissions racing past the existence check: the
            // unique index decides, and the loser sees the duplicate.
            Err(DbError::UniqueViolation { .. }) => {
                return Err(ServiceError::Domain(CoreError::DuplicateReturnRequest {
                    item_id: order_item_id.to_string(),
                }));
            }
            Err(other) => return Err(other.into()),
        }
        tx.commit().await?;

        info!(request_id = %request.id, order_item_id, refund = request.refund_amount_paise, "Return requested");

        self.notify_status(&request).await;
        Ok(request)
    }

    /// Approves a requested return.
    pub async fn approve(&self, request_id: &str) -> ServiceResult<ReturnRequest> {
        self.advance(request_id, ReturnStatus::Approved).await
    }

    /// Schedules the courier pickup for an approved return.
    pub async fn schedule_pickup(
        &self,
        request_id: &str,
        pickup_date: NaiveDate,
    ) -> ServiceResult<ReturnRequest> {
        let request = self.get_request(request_id).await?;
        check_return_transition(request.status, ReturnStatus::PickupScheduled)
            .map_err(ServiceError::Domain)?;

        let mut tx = self.db.pool().begin().await?;
        return_repo::update_status(&mut *tx, request_id, ReturnStatus::PickupScheduled).await?;
        return_repo::set_pickup_date(&mut *tx, request_id, pickup_date).await?;
        tx.commit().await?;

        let request = self.get_request(request_id).await?;
        self.notify_status(&request).await;
        Ok(request)
    }

    /// Records the courier pickup; the order item becomes `Returned`.
    pub async fn mark_picked_up(&self, request_id: &str) -> ServiceResult<ReturnRequest> {
        let request = self.get_request(request_id).await?;
        check_return_transition(request.status, ReturnStatus::PickedUp)
            .map_err(ServiceError::Domain)?;

        let mut tx = self.db.pool().begin().await?;
        return_repo::update_status(&mut *tx, request_id, ReturnStatus::PickedUp).await?;
        order_repo::update_item_status(&mut *tx, &request.order_item_id, OrderItemStatus::Returned)
            .await?;
        tx.commit().await?;

        let request = self.get_request(request_id).await?;
        self.notify_status(&request).await;
        Ok(request)
    }

    /// Starts the refund after the item passed inspection.
    pub async fn initiate_refund(&self, request_id: &str) -> ServiceResult<ReturnRequest> {
        self.advance(request_id, ReturnStatus::RefundInitiated).await
    }

    /// Completes the refund: credits the wallet with the frozen amount,
    /// restores stock, and marks the item `Refunded`.
    ///
    /// Idempotent: a request already refunded returns unchanged with no
    /// further side effects.
    #[instrument(skip(self))]
    pub async fn complete_refund(&self, request_id: &str) -> ServiceResult<ReturnRequest> {
        let request = self.get_request(request_id).await?;

        if request.status == ReturnStatus::Refunded {
            return Ok(request);
        }
        check_return_transition(request.status, ReturnStatus::Refunded)
            .map_err(ServiceError::Domain)?;

        let item = self
            .db
            .orders()
            .get_item(&request.order_item_id)
            .await?
            .ok_or_else(|| DbError::not_found("OrderItem", &request.order_item_id))?;

        let wallet = self.db.wallets().get_or_create(&request.user_id).await?;

        let mut tx = self.db.pool().begin().await?;

        // The latch guards the side effects even if two operators race
        // this call; only the winner runs them.
        if return_repo::claim_refund_latch(&mut *tx, request_id).await? {
            catalog::restore_stock(&mut *tx, &item.variant_id, item.quantity).await?;
            ledger::credit(
                &mut *tx,
                &wallet.id,
                request.refund_amount(),
                &format!("Refund for returned item {}", item.product_name),
            )
            .await?;
            order_repo::update_item_status(&mut *tx, &item.id, OrderItemStatus::Refunded).await?;
        }

        tx.commit().await?;

        info!(request_id, amount = request.refund_amount_paise, "Refund completed");

        notify_best_effort(
            &self.notifier,
            NotificationEvent::RefundCompleted {
                user_id: request.user_id.clone(),
                request_id: request_id.to_string(),
                amount_paise: request.refund_amount_paise,
            },
        )
        .await;

        self.get_request(request_id).await
    }

    /// Declines a return. Terminal; no refund, no stock movement.
    pub async fn decline(&self, request_id: &str) -> ServiceResult<ReturnRequest> {
        self.advance(request_id, ReturnStatus::Declined).await
    }

    /// Checks and applies a plain status transition.
    async fn advance(&self, request_id: &str, to: ReturnStatus) -> ServiceResult<ReturnRequest> {
        let request = self.get_request(request_id).await?;
        check_return_transition(request.status, to).map_err(ServiceError::Domain)?;

        let mut tx = self.db.pool().begin().await?;
        return_repo::update_status(&mut *tx, request_id, to).await?;
        tx.commit().await?;

        let request = self.get_request(request_id).await?;
        self.notify_status(&request).await;
        Ok(request)
    }

    async fn get_request(&self, request_id: &str) -> ServiceResult<ReturnRequest> {
        self.db
            .returns()
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| DbError::not_found("ReturnRequest", request_id).into())
    }

    async fn notify_status(&self, request: &ReturnRequest) {
        notify_best_effort(
            &self.notifier,
            NotificationEvent::ReturnUpdated {
                user_id: request.user_id.clone(),
                request_id: request.id.clone(),
                status: format!("{:?}", request.status),
            },
        )
        .await;
    }
}
