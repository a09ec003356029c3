use sqlx::{postgres::PgPoolOptions, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Self::ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates the tables this service owns if they do not exist.
    ///
    /// The wider user model lives elsewhere; we only need the columns the
    /// recommendation pipeline reads and writes (stored address, bounded
    /// history log).
    async fn ensure_schema(pool: &PgPool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email TEXT UNIQUE,
                api_token TEXT UNIQUE,
                stored_address JSONB,
                address_updated_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recommendation_history (
                request_id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                total_wattage DOUBLE PRECISION NOT NULL,
                daily_consumption DOUBLE PRECISION NOT NULL,
                appliances JSONB NOT NULL,
                location JSONB NOT NULL,
                solar_conditions JSONB NOT NULL,
                recommended_system JSONB NOT NULL,
                ai_model TEXT NOT NULL,
                processing_time_ms BIGINT NOT NULL,
                price_per_watt DOUBLE PRECISION NOT NULL,
                requested_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_user_requested
             ON recommendation_history (user_id, requested_at DESC)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}
