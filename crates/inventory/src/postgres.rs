use async_trait::async_trait;
use common::{ProductId, VariantKey};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    CheckRequest, CheckStatus, InventoryApi, ReduceRequest, ReduceStatus, Result, RestoreRequest,
    RestoreStatus, StockRecord,
};

/// PostgreSQL-backed inventory store.
///
/// The conditional decrement runs as a single guarded `UPDATE`, so the row
/// lock linearizes concurrent reduces; the token journal row is inserted in
/// the same transaction, which is what makes replays observable.
#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    /// Creates a new PostgreSQL inventory store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Creates or restocks a record, leaving any reserved quantity intact.
    pub async fn set_stock(
        &self,
        product_id: ProductId,
        variant_key: VariantKey,
        available: u32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_records (product_id, variant_key, available, reserved, version)
            VALUES ($1, $2, $3, 0, 1)
            ON CONFLICT (product_id, variant_key) DO UPDATE SET
                available = EXCLUDED.available,
                version = stock_records.version + 1
            "#,
        )
        .bind(product_id.as_str())
        .bind(variant_key.as_str())
        .bind(i64::from(available))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns the current counters for a stock position, if stocked.
    pub async fn stock(
        &self,
        product_id: &ProductId,
        variant_key: &VariantKey,
    ) -> Result<Option<StockRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT available, reserved, version
            FROM stock_records
            WHERE product_id = $1 AND variant_key = $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(variant_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    fn row_to_record(row: PgRow) -> Result<StockRecord> {
        Ok(StockRecord {
            available: quantity_column(&row, "available")?,
            reserved: quantity_column(&row, "reserved")?,
            version: row.try_get::<i64, _>("version")? as u64,
        })
    }
}

// Schema CHECKs keep quantities non-negative; the clamp guards the cast.
fn quantity_column(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column)?;
    Ok(raw.clamp(0, i64::from(u32::MAX)) as u32)
}

#[async_trait]
impl InventoryApi for PgInventoryStore {
    async fn check_availability(&self, request: CheckRequest) -> Result<CheckStatus> {
        let available: Option<i64> = sqlx::query_scalar(
            "SELECT available FROM stock_records WHERE product_id = $1 AND variant_key = $2",
        )
        .bind(request.product_id.as_str())
        .bind(request.variant_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if available.unwrap_or(0) >= i64::from(request.quantity) {
            Ok(CheckStatus::Available)
        } else {
            Ok(CheckStatus::Insufficient)
        }
    }

    async fn reduce_inventory(&self, request: ReduceRequest) -> Result<ReduceStatus> {
        let mut tx = self.pool.begin().await?;

        // Journal first: a concurrent duplicate of this token blocks on the
        // row until we resolve, then observes the conflict.
        let journaled = sqlx::query(
            r#"
            INSERT INTO reduction_journal (token, product_id, variant_key, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(request.token.as_str())
        .bind(request.product_id.as_str())
        .bind(request.variant_key.as_str())
        .bind(i64::from(request.quantity))
        .execute(&mut *tx)
        .await?;

        if journaled.rows_affected() == 0 {
            tx.commit().await?;
            tracing::debug!(token = %request.token, "reduce replay, already applied");
            return Ok(ReduceStatus::AlreadyApplied);
        }

        let updated = sqlx::query(
            r#"
            UPDATE stock_records
            SET available = available - $3, reserved = reserved + $3, version = version + 1
            WHERE product_id = $1 AND variant_key = $2 AND available >= $3
            "#,
        )
        .bind(request.product_id.as_str())
        .bind(request.variant_key.as_str())
        .bind(i64::from(request.quantity))
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Rolling back discards the journal row too: a refused reduce
            // leaves no trace for restore to find.
            tx.rollback().await?;
            return Ok(ReduceStatus::InsufficientStock);
        }

        tx.commit().await?;
        tracing::debug!(token = %request.token, quantity = request.quantity, "reduce committed");
        Ok(ReduceStatus::Committed)
    }

    async fn restore_inventory(&self, request: RestoreRequest) -> Result<RestoreStatus> {
        let mut tx = self.pool.begin().await?;

        // Lock the journal row so concurrent restores of one token serialize.
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT product_id, variant_key, quantity, restored
            FROM reduction_journal
            WHERE token = $1
            FOR UPDATE
            "#,
        )
        .bind(request.token.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tracing::warn!(token = %request.token, "restore for a token never committed");
            return Ok(RestoreStatus::NotFound);
        };
        if row.try_get::<bool, _>("restored")? {
            return Ok(RestoreStatus::AlreadyApplied);
        }

        // The journal, not the request, is authoritative for what to put back.
        let product_id: String = row.try_get("product_id")?;
        let variant_key: String = row.try_get("variant_key")?;
        let quantity: i64 = row.try_get("quantity")?;

        sqlx::query(
            r#"
            UPDATE stock_records
            SET available = available + $3,
                reserved = GREATEST(reserved - $3, 0),
                version = version + 1
            WHERE product_id = $1 AND variant_key = $2
            "#,
        )
        .bind(&product_id)
        .bind(&variant_key)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE reduction_journal SET restored = TRUE WHERE token = $1")
            .bind(request.token.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(token = %request.token, quantity, "restore committed");
        Ok(RestoreStatus::Committed)
    }
}
