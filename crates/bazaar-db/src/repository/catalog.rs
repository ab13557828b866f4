//! # Catalog Repository
//!
//! Read access to products, variants and offers, plus the guarded stock
//! mutations that make the inventory ledger safe under concurrency.
//!
//! ## Stock Reservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Guarded Decrement (no read-modify-write)               │
//! │                                                                         │
//! │  UPDATE product_variants                                               │
//! │     SET stock = stock - :qty                                           │
//! │   WHERE id = :variant AND stock >= :qty                                │
//! │                                                                         │
//! │  rows_affected == 1  →  reservation succeeded                          │
//! │  rows_affected == 0  →  another checkout won the race; the whole       │
//! │                         placement transaction rolls back               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::{CatalogProduct, Offer, ProductVariant};

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<CatalogProduct>> {
        let product = sqlx::query_as::<_, CatalogProduct>(
            r#"
            SELECT id, name, price_paise, subcategory_id, is_active
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a variant by ID.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, size, stock, is_active, created_at, updated_at
            FROM product_variants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Gets all variants of a product.
    pub async fn variants_of(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, size, stock, is_active, created_at, updated_at
            FROM product_variants
            WHERE product_id = ?1
            ORDER BY size
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Gets every offer that is flagged active.
    ///
    /// Date-window filtering happens in the pricing engine
    /// (`Offer::applies_at`), so pricing and this query agree on a
    /// single clock.
    pub async fn active_offers(&self) -> DbResult<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(
            r#"
            SELECT id, scope, target_id, percent_bps, starts_at, ends_at, is_active
            FROM offers
            WHERE is_active = 1
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(offers)
    }

    /// Inserts a product (seed/admin path).
    pub async fn insert_product(&self, product: &CatalogProduct) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_paise, subcategory_id, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price_paise)
        .bind(&product.subcategory_id)
        .bind(product.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a variant (seed/admin path).
    pub async fn insert_variant(&self, variant: &ProductVariant) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, size, stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.size)
        .bind(variant.stock)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts an offer (seed/admin path).
    pub async fn insert_offer(&self, offer: &Offer) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO offers (
                id, scope, target_id, percent_bps, starts_at, ends_at, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&offer.id)
        .bind(offer.scope)
        .bind(&offer.target_id)
        .bind(offer.percent_bps)
        .bind(offer.starts_at)
        .bind(offer.ends_at)
        .bind(offer.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Transaction-composable stock mutations
// =============================================================================

/// Reserves stock for a variant inside an open transaction.
///
/// Guarded decrement: fails (and thus rolls back the caller's
/// transaction) when remaining stock is below `quantity`.
pub async fn reserve_stock(
    conn: &mut SqliteConnection,
    variant_id: &str,
    quantity: i64,
) -> DbResult<()> {
    debug!(variant_id, quantity, "Reserving stock");

    let result = sqlx::query(
        r#"
        UPDATE product_variants
        SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND stock >= ?2
        "#,
    )
    .bind(variant_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(format!(
            "stock for variant {} dropped below {}",
            variant_id, quantity
        )));
    }

    Ok(())
}

/// Restores stock for a variant inside an open transaction.
///
/// Used on cancellation and (once, latched) on completed refunds.
pub async fn restore_stock(
    conn: &mut SqliteConnection,
    variant_id: &str,
    quantity: i64,
) -> DbResult<()> {
    debug!(variant_id, quantity, "Restoring stock");

    let result = sqlx::query(
        r#"
        UPDATE product_variants
        SET stock = stock + ?2, updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(variant_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("ProductVariant", variant_id));
    }

    Ok(())
}
