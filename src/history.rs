//! Bounded per-user history of recommendation requests.
//!
//! Recording is best-effort and must never fail or delay the outer
//! request: failures are logged and swallowed. The log is capped at
//! [`HISTORY_CAP`] entries with FIFO eviction, enforced inside a single
//! transaction so concurrent appends for the same user cannot lose
//! updates.

use crate::errors::AppError;
use crate::models::HistoryEntry;
use sqlx::PgPool;
use uuid::Uuid;

pub const HISTORY_CAP: i64 = 10;

pub struct HistoryStorage {
    pool: PgPool,
}

impl HistoryStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a history entry and trims the user's log to the cap,
    /// oldest-first, in one transaction.
    ///
    /// Concurrent appends for the same user are serialized on the user row:
    /// under READ COMMITTED, two unserialized transactions would each trim
    /// against a snapshot missing the other's insert and commit 11 rows.
    pub async fn record(&self, user_id: Uuid, entry: &HistoryEntry) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO recommendation_history (
                request_id, user_id, total_wattage, daily_consumption,
                appliances, location, solar_conditions, recommended_system,
                ai_model, processing_time_ms, price_per_watt, requested_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.request_id)
        .bind(user_id)
        .bind(entry.total_wattage)
        .bind(entry.daily_consumption)
        .bind(&entry.appliances)
        .bind(&entry.location)
        .bind(&entry.solar_conditions)
        .bind(&entry.recommended_system)
        .bind(&entry.ai_model)
        .bind(entry.processing_time_ms)
        .bind(entry.price_per_watt)
        .bind(entry.requested_at)
        .execute(&mut *tx)
        .await?;

        // FIFO eviction: keep only the newest HISTORY_CAP rows
        sqlx::query(
            r#"
            DELETE FROM recommendation_history
            WHERE user_id = $1
              AND request_id NOT IN (
                  SELECT request_id FROM recommendation_history
                  WHERE user_id = $1
                  ORDER BY requested_at DESC, request_id DESC
                  LIMIT $2
              )
            "#,
        )
        .bind(user_id)
        .bind(HISTORY_CAP)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Fire-and-forget variant used from the request path: any storage
    /// failure is logged, never surfaced.
    pub async fn record_best_effort(&self, user_id: Uuid, entry: HistoryEntry) {
        if let Err(e) = self.record(user_id, &entry).await {
            tracing::error!(
                "Failed to record history for user {} (request {}): {}",
                user_id,
                entry.request_id,
                e
            );
        } else {
            tracing::debug!(
                "Recorded history entry {} for user {}",
                entry.request_id,
                user_id
            );
        }
    }

    /// Returns the user's history, newest first.
    pub async fn fetch(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, AppError> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT request_id, total_wattage, daily_consumption, appliances,
                   location, solar_conditions, recommended_system, ai_model,
                   processing_time_ms, price_per_watt, requested_at
            FROM recommendation_history
            WHERE user_id = $1
            ORDER BY requested_at DESC, request_id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
