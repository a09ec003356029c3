use std::env;

use chrono::{Duration, Utc};
use uuid::Uuid;

use solar_advisor_api::db::Database;
use solar_advisor_api::history::{HistoryStorage, HISTORY_CAP};
use solar_advisor_api::models::HistoryEntry;

/// Integration tests for the bounded history log against a real Postgres.
/// Marked ignored to avoid running against production by accident; set
/// TEST_DATABASE_URL to run.
async fn connect() -> anyhow::Result<Database> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    Database::new(&db_url).await
}

async fn create_test_user(db: &Database) -> anyhow::Result<Uuid> {
    // Unique email/token to avoid conflicts on repeated runs
    let suffix = Uuid::new_v4();
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO users (email, api_token) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("history-test-{}@example.com", suffix))
    .bind(format!("test-token-{}", suffix))
    .fetch_one(&db.pool)
    .await?;
    Ok(row.0)
}

fn history_entry(label: &str, requested_at: chrono::DateTime<Utc>) -> HistoryEntry {
    HistoryEntry {
        request_id: Uuid::new_v4(),
        total_wattage: 1500.0,
        daily_consumption: 12.5,
        appliances: serde_json::json!([{"nameOfItem": label, "quantity": 1}]),
        location: serde_json::json!({"city": "Lagos"}),
        solar_conditions: serde_json::json!({"averageSunlightHours": 6.5}),
        recommended_system: serde_json::json!({"systemName": label}),
        ai_model: "gemini-1.5-flash".to_string(),
        processing_time_ms: 1200,
        price_per_watt: 2000.0,
        requested_at,
    }
}

#[tokio::test]
#[ignore]
async fn sequential_appends_evict_oldest_first() -> anyhow::Result<()> {
    let db = connect().await?;
    let user_id = create_test_user(&db).await?;
    let storage = HistoryStorage::new(db.pool.clone());

    let base = Utc::now();
    for i in 0..15 {
        let entry = history_entry(&format!("system-{}", i), base + Duration::seconds(i));
        storage
            .record(user_id, &entry)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    let entries = storage
        .fetch(user_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    assert_eq!(entries.len() as i64, HISTORY_CAP);
    // Newest first; the five oldest (0..5) must be gone
    assert_eq!(entries[0].recommended_system["systemName"], "system-14");
    assert_eq!(entries[9].recommended_system["systemName"], "system-5");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn concurrent_appends_never_exceed_cap() -> anyhow::Result<()> {
    let db = connect().await?;
    let user_id = create_test_user(&db).await?;
    let storage = HistoryStorage::new(db.pool.clone());

    // Fill the log to the cap first
    let base = Utc::now();
    for i in 0..HISTORY_CAP {
        let entry = history_entry(&format!("seed-{}", i), base + Duration::seconds(i));
        storage
            .record(user_id, &entry)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    // Concurrent appends must serialize on the user row; without that, two
    // transactions can both trim the same oldest row and commit 11.
    let mut handles = vec![];
    for i in 0..5 {
        let pool = db.pool.clone();
        let entry = history_entry(
            &format!("concurrent-{}", i),
            base + Duration::seconds(HISTORY_CAP + i),
        );
        handles.push(tokio::spawn(async move {
            HistoryStorage::new(pool).record(user_id, &entry).await
        }));
    }
    for handle in handles {
        handle
            .await?
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    }

    let entries = storage
        .fetch(user_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(entries.len() as i64, HISTORY_CAP);
    Ok(())
}
