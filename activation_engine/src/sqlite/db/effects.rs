use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::db_types::{EffectRecord, EffectType, TransactionId};

/// Records that `effect` has been applied to the transaction. Returns `false`, without error, if the fingerprint was
/// already present, in which case the caller must not apply the effect again.
pub async fn record_effect(
    id: &TransactionId,
    effect: EffectType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let fingerprint = crate::helpers::idempotency_fingerprint(id, effect);
    let result =
        sqlx::query("INSERT INTO effect_log (fingerprint, transaction_id, effect, applied_at) VALUES ($1, $2, $3, $4)")
            .bind(&fingerprint)
            .bind(id.as_str())
            .bind(effect)
            .bind(now)
            .execute(conn)
            .await;
    match result {
        Ok(_) => {
            debug!("🗃️ Effect {effect} recorded for [{id}] ({fingerprint})");
            Ok(true)
        },
        Err(e) if is_unique_violation(&e) => {
            debug!("🗃️ Effect {effect} for [{id}] was already recorded");
            Ok(false)
        },
        Err(e) => Err(e),
    }
}

pub async fn effect_applied(
    id: &TransactionId,
    effect: EffectType,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let fingerprint = crate::helpers::idempotency_fingerprint(id, effect);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM effect_log WHERE fingerprint = $1")
        .bind(fingerprint)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

pub async fn effects_for(id: &TransactionId, conn: &mut SqliteConnection) -> Result<Vec<EffectRecord>, sqlx::Error> {
    sqlx::query_as(
        "SELECT fingerprint, transaction_id, effect, applied_at FROM effect_log WHERE transaction_id = $1 ORDER BY \
         applied_at ASC",
    )
    .bind(id.as_str())
    .fetch_all(conn)
    .await
}
