//! # bazaar-db: Database & Service Layer for the Bazaar Order Engine
//!
//! This crate provides persistence and the transactional services that
//! drive the order engine. It uses SQLite with sqlx for async
//! operations; all business rules live in `bazaar-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Data Flow                                 │
//! │                                                                         │
//! │  Caller (storefront API, admin tool, tests)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bazaar-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌────────────────┐  │   │
//! │  │   │   Services    │   │ Repositories  │   │   Migrations   │  │   │
//! │  │   │ (checkout,    │──►│ (catalog,     │   │   (embedded)   │  │   │
//! │  │   │  fulfillment, │   │  cart, order, │   │                │  │   │
//! │  │   │  returns,     │   │  wallet, ...) │   │ 001_init.sql   │  │   │
//! │  │   │  wallet)      │   │               │   │                │  │   │
//! │  │   └───────┬───────┘   └───────┬───────┘   └────────────────┘  │   │
//! │  │           │    bazaar-core    │                                │   │
//! │  │           │  (pure rules)     │                                │   │
//! │  │           ▼                   ▼                                │   │
//! │  │   ┌─────────────────────────────────────────────────────────┐ │   │
//! │  │   │            Database (pool.rs, SqlitePool)               │ │   │
//! │  │   └─────────────────────────────────────────────────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL mode, one transaction per multi-step mutation)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and service error types
//! - [`repository`] - Repository implementations
//! - [`service`] - Transactional services and external ports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{CheckoutService, Database, DbConfig, FakeGateway, RecordingNotifier};
//! use bazaar_core::{CheckoutSession, PaymentMethod};
//!
//! let db = Database::new(DbConfig::new("path/to/bazaar.db")).await?;
//!
//! let checkout = CheckoutService::new(db.clone(), FakeGateway::new(), RecordingNotifier::new());
//! let session = CheckoutSession::with_coupon("user-1", "FESTIVE10");
//! let order = checkout.place_order(&session, "addr-1", PaymentMethod::Wallet).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, ServiceError};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::coupon::CouponRepository;
pub use repository::order::{OrderRepository, OrderSummary};
pub use repository::payment::PaymentRepository;
pub use repository::returns::ReturnRepository;
pub use repository::wallet::WalletRepository;

// Service re-exports
pub use service::{
    CheckoutService, FakeGateway, FulfillmentService, NotificationEvent, Notifier,
    PaymentGateway, RecordingNotifier, ReturnService, WalletService,
};
