use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::SqliteConnection;

use crate::db_types::{BudgetLedgerEntry, Cents};

pub async fn fetch_ledger(
    business_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<BudgetLedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM budget_ledgers WHERE business_id = $1").bind(business_id).fetch_optional(conn).await
}

/// Conditional decrement of the monthly budget. The guard and the write are one statement, so concurrent callers for
/// the same business are serialized by SQLite's writer lock and the balance never goes negative.
///
/// Returns `false` if the ledger does not exist or holds less than `amount`.
pub async fn try_decrement(
    business_id: &str,
    amount: Cents,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE budget_ledgers SET
            monthly_budget_remaining_cents = monthly_budget_remaining_cents - $2,
            updated_at = $3
        WHERE business_id = $1 AND monthly_budget_remaining_cents >= $2
        "#,
    )
    .bind(business_id)
    .bind(amount)
    .bind(now)
    .execute(conn)
    .await?;
    let ok = result.rows_affected() == 1;
    if ok {
        debug!("💰️ Deducted {amount} from the budget of {business_id}");
    } else {
        debug!("💰️ Budget of {business_id} cannot cover {amount}");
    }
    Ok(ok)
}

/// Takes one commission-free-offer credit. Returns the updated entry, or `None` if no credits remain.
pub async fn take_free_offer_credit(
    business_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<BudgetLedgerEntry>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE budget_ledgers SET
            commission_free_offers_remaining = commission_free_offers_remaining - 1,
            updated_at = $2
        WHERE business_id = $1 AND commission_free_offers_remaining > 0
        RETURNING *;
        "#,
    )
    .bind(business_id)
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// Creates the ledger, or moves it on to a later billing period. Returns `None` if the ledger is already on
/// `period_start` or a later period, so replayed or out-of-order renewals change nothing.
#[allow(clippy::too_many_arguments)]
pub async fn reset_ledger(
    business_id: &str,
    budget: Cents,
    commission_free_offers: i64,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<BudgetLedgerEntry>, sqlx::Error> {
    let entry: Option<BudgetLedgerEntry> = sqlx::query_as(
        r#"
        INSERT INTO budget_ledgers (
            business_id,
            monthly_budget_remaining_cents,
            commission_free_offers_remaining,
            period_start,
            period_end,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (business_id) DO UPDATE SET
            monthly_budget_remaining_cents = excluded.monthly_budget_remaining_cents,
            commission_free_offers_remaining = excluded.commission_free_offers_remaining,
            period_start = excluded.period_start,
            period_end = excluded.period_end,
            updated_at = excluded.updated_at
        WHERE excluded.period_start > budget_ledgers.period_start
        RETURNING *;
        "#,
    )
    .bind(business_id)
    .bind(budget)
    .bind(commission_free_offers)
    .bind(period_start)
    .bind(period_end)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    if let Some(e) = &entry {
        info!(
            "💰️ Ledger for {business_id} reset to {} and {} commission-free offers for the period starting {}",
            e.monthly_budget_remaining_cents, e.commission_free_offers_remaining, e.period_start
        );
    }
    Ok(entry)
}
