use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{SettlementEntry, Transaction};

/// Writes the settlement journal entry for a paid transaction. The entry mirrors the transaction's stored amounts.
pub async fn insert_settlement(
    tx: &Transaction,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<SettlementEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO settlement_journal (
            transaction_id, business_id, gross_cents, commission_cents, net_cents, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING transaction_id, business_id, gross_cents, commission_cents, net_cents, created_at;
        "#,
    )
    .bind(&tx.id)
    .bind(&tx.payee_ref)
    .bind(tx.amount_gross_cents)
    .bind(tx.commission_cents)
    .bind(tx.amount_net_cents)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn settlements_for_business(
    business_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<SettlementEntry>, sqlx::Error> {
    sqlx::query_as(
        "SELECT transaction_id, business_id, gross_cents, commission_cents, net_cents, created_at FROM \
         settlement_journal WHERE business_id = $1 ORDER BY id ASC",
    )
    .bind(business_id)
    .fetch_all(conn)
    .await
}
