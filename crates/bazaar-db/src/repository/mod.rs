//! # Repository Module
//!
//! Database repository implementations for the Bazaar order engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service (checkout, fulfillment, returns)                              │
//! │       │                                                                 │
//! │       │  db.carts().view_for_user("u1")          ← pool-based reads    │
//! │       │  catalog::reserve_stock(&mut tx, ...)    ← tx-composable       │
//! │       │                                             mutations          │
//! │       ▼                                                                 │
//! │  Repository                                                            │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Shapes Per Repository
//!
//! - Struct methods on a pool clone for reads and single-statement writes
//! - Free functions taking `&mut SqliteConnection` for mutations that
//!   must compose into one transaction (place order, cancel, refund)
//!
//! Everything here returns [`DbResult`](crate::error::DbResult); domain
//! rules and domain errors belong to the service layer.
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - products, variants, offers, stock
//! - [`cart::CartRepository`] - cart lines and the priced cart view
//! - [`coupon::CouponRepository`] - coupons and per-user usage counters
//! - [`order::OrderRepository`] - orders and order items
//! - [`wallet::WalletRepository`] - wallets and the append-only ledger
//! - [`returns::ReturnRepository`] - return requests
//! - [`payment::PaymentRepository`] - gateway payment records

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod order;
pub mod payment;
pub mod returns;
pub mod wallet;
