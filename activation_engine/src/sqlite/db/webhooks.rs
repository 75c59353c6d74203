use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

pub async fn event_seen(event_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events WHERE event_id = $1")
        .bind(event_id)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Returns `false` if the event was already recorded.
pub async fn record_event(
    event_id: &str,
    event_type: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO webhook_events (event_id, event_type, received_at) VALUES ($1, $2, $3) ON CONFLICT (event_id) DO \
         NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
