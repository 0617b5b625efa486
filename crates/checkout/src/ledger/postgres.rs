use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{IdempotencyToken, OrderAttemptId, ProductId, VariantKey};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::ledger::{LedgerError, ReservationLedger, Result};
use crate::reservation::{ReservationEntry, ReservationState};

/// PostgreSQL-backed reservation ledger.
///
/// Transitions run as a single guarded `UPDATE` conditioned on the expected
/// source state, so two racing callers cannot both move an entry; the loser
/// observes zero rows and gets the transition error a serial caller would.
#[derive(Clone)]
pub struct PgReservationLedger {
    pool: PgPool,
}

impl PgReservationLedger {
    /// Creates a new PostgreSQL reservation ledger.
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

    async fn transition(
        &self,
        token: &IdempotencyToken,
        from: ReservationState,
        to: ReservationState,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE reservation_entries
            SET state = $2, last_transition_at = now()
            WHERE token = $1 AND state = $3
            "#,
        )
        .bind(token.as_str())
        .bind(to.as_str())
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing moved: find out whether the token is missing or the entry
        // sits in a state the transition does not start from.
        let current: Option<String> =
            sqlx::query_scalar("SELECT state FROM reservation_entries WHERE token = $1")
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(LedgerError::UnknownToken(token.clone())),
            Some(state) => {
                let from = ReservationState::parse(&state)
                    .ok_or(LedgerError::CorruptState(state))?;
                Err(LedgerError::InvalidTransition {
                    token: token.clone(),
                    from,
                    to,
                })
            }
        }
    }

    fn row_to_entry(row: PgRow) -> Result<ReservationEntry> {
        let state: String = row.try_get("state")?;
        let state = ReservationState::parse(&state).ok_or(LedgerError::CorruptState(state))?;

        Ok(ReservationEntry {
            token: IdempotencyToken::new(row.try_get::<String, _>("token")?),
            order_attempt_id: OrderAttemptId::from_uuid(row.try_get::<Uuid, _>("order_attempt_id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            variant_key: VariantKey::new(row.try_get::<String, _>("variant_key")?),
            quantity: quantity_column(&row, "quantity")?,
            state,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            last_transition_at: row.try_get::<DateTime<Utc>, _>("last_transition_at")?,
        })
    }
}

// Schema CHECKs keep quantities non-negative; the clamp guards the cast.
fn quantity_column(row: &PgRow, column: &str) -> Result<u32> {
    let raw: i64 = row.try_get(column)?;
    Ok(raw.clamp(0, i64::from(u32::MAX)) as u32)
}

#[async_trait]
impl ReservationLedger for PgReservationLedger {
    async fn begin(
        &self,
        order_attempt_id: OrderAttemptId,
        product_id: ProductId,
        variant_key: VariantKey,
        quantity: u32,
    ) -> Result<ReservationEntry> {
        let entry = ReservationEntry::new(order_attempt_id, product_id, variant_key, quantity);

        let inserted = sqlx::query(
            r#"
            INSERT INTO reservation_entries
                (token, order_attempt_id, product_id, variant_key, quantity, state,
                 created_at, last_transition_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(entry.token.as_str())
        .bind(entry.order_attempt_id.as_uuid())
        .bind(entry.product_id.as_str())
        .bind(entry.variant_key.as_str())
        .bind(i64::from(entry.quantity))
        .bind(entry.state.as_str())
        .bind(entry.created_at)
        .bind(entry.last_transition_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(LedgerError::DuplicateToken(entry.token));
        }

        tracing::debug!(token = %entry.token, quantity, "reservation begun");
        Ok(entry)
    }

    async fn mark_committed(&self, token: &IdempotencyToken) -> Result<()> {
        self.transition(token, ReservationState::Pending, ReservationState::Committed)
            .await
    }

    async fn mark_failed(&self, token: &IdempotencyToken) -> Result<()> {
        self.transition(token, ReservationState::Pending, ReservationState::Failed)
            .await
    }

    async fn mark_compensated(&self, token: &IdempotencyToken) -> Result<()> {
        self.transition(token, ReservationState::Committed, ReservationState::Compensated)
            .await
    }

    async fn entries_for_attempt(
        &self,
        order_attempt_id: OrderAttemptId,
    ) -> Result<Vec<ReservationEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT token, order_attempt_id, product_id, variant_key, quantity, state,
                   created_at, last_transition_at
            FROM reservation_entries
            WHERE order_attempt_id = $1
            ORDER BY created_at ASC, token ASC
            "#,
        )
        .bind(order_attempt_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn entry(&self, token: &IdempotencyToken) -> Result<Option<ReservationEntry>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT token, order_attempt_id, product_id, variant_key, quantity, state,
                   created_at, last_transition_at
            FROM reservation_entries
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }
}
