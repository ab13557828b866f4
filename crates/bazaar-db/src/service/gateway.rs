//! # External Ports
//!
//! The two seams where the engine touches the outside world: the
//! payment gateway and the notification channel.
//!
//! ## Port Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Services ──► PaymentGateway (trait) ──► real HTTP client (external)   │
//! │           ──► Notifier       (trait) ──► email/SMS relay   (external)  │
//! │                                                                         │
//! │  Gateway failures are hard errors (the checkout aborts).               │
//! │  Notification failures are logged at WARN and swallowed - a lost       │
//! │  email never rolls back an order.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-memory fakes live here too so integration tests and the
//! services share one set of port contracts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

use bazaar_core::Money;

// =============================================================================
// Errors
// =============================================================================

/// A payment gateway call failed (network, auth, gateway outage).
#[derive(Debug, Error)]
#[error("gateway error: {0}")]
pub struct GatewayError(pub String);

/// A notification could not be delivered.
#[derive(Debug, Error)]
#[error("notification error: {0}")]
pub struct NotifyError(pub String);

// =============================================================================
// Payment gateway port
// =============================================================================

/// A payment intent created at the gateway.
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    /// The gateway's id for this intent; echoed back on verification.
    pub gateway_order_id: String,
}

/// Outbound port to the external payment gateway.
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for `amount`.
    fn create_intent(
        &self,
        amount: Money,
    ) -> impl std::future::Future<Output = Result<GatewayIntent, GatewayError>> + Send;

    /// Verifies a settlement callback's signature.
    ///
    /// Returns `Ok(true)` when the signature is authentic, `Ok(false)`
    /// when it is not, and `Err` only for transport failures.
    fn verify(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> impl std::future::Future<Output = Result<bool, GatewayError>> + Send;
}

// =============================================================================
// Notification port
// =============================================================================

/// Events the engine announces to the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    OrderPlaced {
        user_id: String,
        order_code: String,
        total_paise: i64,
    },
    OrderStatusChanged {
        user_id: String,
        order_code: String,
        status: String,
    },
    OrderCancelled {
        user_id: String,
        order_code: String,
        refund_paise: i64,
    },
    ItemCancelled {
        user_id: String,
        order_code: String,
        item_id: String,
        refund_paise: i64,
    },
    ReturnUpdated {
        user_id: String,
        request_id: String,
        status: String,
    },
    RefundCompleted {
        user_id: String,
        request_id: String,
        amount_paise: i64,
    },
    WalletCredited {
        user_id: String,
        amount_paise: i64,
    },
}

/// Outbound port for customer notifications.
pub trait Notifier: Send + Sync {
    fn send(
        &self,
        event: &NotificationEvent,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}

/// Fires a notification, logging and swallowing any failure.
///
/// State changes must never depend on the notification channel.
pub async fn notify_best_effort<N: Notifier>(notifier: &N, event: NotificationEvent) {
    if let Err(err) = notifier.send(&event).await {
        warn!(%err, ?event, "Notification delivery failed");
    }
}

// =============================================================================
// In-memory fakes
// =============================================================================

/// In-memory gateway for tests and local development.
///
/// Issues sequential intent ids and verifies a signature iff it equals
/// `sig-{gateway_payment_id}`. Construct with `declining()` to simulate
/// a gateway that rejects every settlement.
#[derive(Debug, Default)]
pub struct FakeGateway {
    counter: AtomicU64,
    decline_all: bool,
}

impl FakeGateway {
    /// A gateway that verifies well-formed signatures.
    pub fn new() -> Self {
        FakeGateway::default()
    }

    /// A gateway that rejects every verification.
    pub fn declining() -> Self {
        FakeGateway {
            counter: AtomicU64::new(0),
            decline_all: true,
        }
    }

    /// The signature this fake accepts for a given payment id.
    pub fn signature_for(gateway_payment_id: &str) -> String {
        format!("sig-{gateway_payment_id}")
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, _amount: Money) -> Result<GatewayIntent, GatewayError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(GatewayIntent {
            gateway_order_id: format!("gw_order_{n}"),
        })
    }

    async fn verify(
        &self,
        _gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError> {
        if self.decline_all {
            return Ok(false);
        }
        Ok(signature == Self::signature_for(gateway_payment_id))
    }
}

/// Notifier that records every event, for test assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    /// Snapshot of everything sent so far.
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|e| NotifyError(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_gateway_verifies_matching_signature() {
        let gateway = FakeGateway::new();
        let ok = gateway
            .verify("gw_order_0", "pay_1", &FakeGateway::signature_for("pay_1"))
            .await
            .unwrap();
        assert!(ok);

        let bad = gateway
            .verify("gw_order_0", "pay_1", "sig-of-someone-else")
            .await
            .unwrap();
        assert!(!bad);
    }

    #[tokio::test]
    async fn test_declining_gateway_rejects_everything() {
        let gateway = FakeGateway::declining();
        let ok = gateway
            .verify("gw_order_0", "pay_1", &FakeGateway::signature_for("pay_1"))
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_recording_notifier_captures_events() {
        let notifier = RecordingNotifier::new();
        notify_best_effort(
            &notifier,
            NotificationEvent::WalletCredited {
                user_id: "u1".into(),
                amount_paise: 500,
            },
        )
        .await;

        let events = notifier.events();
        assert_eq!(events.len(), 1);
    }
}
