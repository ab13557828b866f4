//! # Service Module
//!
//! Transactional services coordinating bazaar-core rules with the
//! repositories.
//!
//! ## Service Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CheckoutService     quote, place order (wallet/COD), gateway flow     │
//! │  FulfillmentService  operator status updates, order/item cancellation  │
//! │  ReturnService       return workflow through to refund completion      │
//! │  WalletService       balance, statement, gateway top-ups               │
//! │                                                                         │
//! │  Each public mutation = one database transaction. Business rules       │
//! │  come from bazaar-core; the services only sequence reads, checks,      │
//! │  and writes.                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## External Seams
//!
//! [`gateway::PaymentGateway`] and [`gateway::Notifier`] are the only
//! two outward-facing dependencies. Services are generic over both, so
//! tests run against the in-memory fakes.

pub mod checkout;
pub mod fulfillment;
pub mod gateway;
pub mod ledger;
pub mod returns;
pub mod wallet;

#[cfg(test)]
mod tests;

pub use checkout::CheckoutService;
pub use fulfillment::FulfillmentService;
pub use gateway::{FakeGateway, NotificationEvent, Notifier, PaymentGateway, RecordingNotifier};
pub use returns::ReturnService;
pub use wallet::WalletService;
