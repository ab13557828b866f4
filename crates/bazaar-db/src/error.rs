//! # Database & Service Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError ← merges DbError with bazaar-core business errors        │
//! │       │          and external (gateway) failures                       │
//! │       ▼                                                                 │
//! │  Caller maps to its own surface (HTTP, admin UI, ...)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No error leaves the order/wallet/inventory data half-mutated: every
//! multi-step mutation runs in one transaction and any of these errors
//! rolls the whole thing back.

use thiserror::Error;

use bazaar_core::CoreError;

// =============================================================================
// DbError
// =============================================================================

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (duplicate coupon code, second
    /// return request for the same item, ...).
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A guarded update found the row in a different state than
    /// expected (stock exhausted under the reservation guard, balance
    /// changed under the wallet guard). Callers may retry.
    #[error("Conflicting concurrent update: {message}")]
    Conflict { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict {
            message: message.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                if message.contains("UNIQUE constraint failed") {
                    DbError::UniqueViolation {
                        field: message
                            .rsplit(':')
                            .next()
                            .unwrap_or("unknown")
                            .trim()
                            .to_string(),
                        value: String::new(),
                    }
                } else if message.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message }
                } else if message.contains("CHECK constraint failed") {
                    DbError::Conflict { message }
                } else {
                    DbError::QueryFailed(message)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Convenience type alias for Results with DbError.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// ServiceError
// =============================================================================

/// Errors surfaced by the transactional services (checkout,
/// fulfillment, wallet, returns).
///
/// Keeps the spec's taxonomy distinguishable: business rule violations
/// arrive as [`CoreError`], storage conflicts/not-found as [`DbError`],
/// and gateway problems as the external variants. Notification failures
/// never appear here - they are logged and swallowed.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business rule violation from bazaar-core.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Storage failure or conflict.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The payment gateway call itself failed.
    #[error("Payment gateway failure: {0}")]
    Gateway(String),

    /// The gateway rejected the payment's signature/verification.
    /// No order is created; reserved stock (if any) is released by the
    /// rolled-back transaction.
    #[error("Payment verification failed for payment {payment_id}")]
    VerificationFailed { payment_id: String },

    /// The cart repriced differently between intent creation and
    /// settlement. The payment is marked failed; nothing is placed.
    #[error("Settled amount {paid_paise} does not match the current cart total {expected_paise}")]
    AmountMismatch {
        expected_paise: i64,
        paid_paise: i64,
    },

    /// Gateway-settled checkouts go through
    /// `begin_gateway_checkout` / `confirm_gateway_payment`, not
    /// direct placement.
    #[error("Gateway payments settle through the gateway checkout flow")]
    GatewayFlowRequired,
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(DbError::from(err))
    }
}

/// Convenience type alias for Results with ServiceError.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Unit Tests
// =============================================================================
