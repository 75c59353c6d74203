use chrono::{DateTime, Duration, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use super::{is_unique_violation, sql_list};
use crate::{
    db_types::{FundingMode, NewTransaction, Transaction, TransactionId, TransactionKind, TransactionStatus},
    traits::{StoreError, SweepWindow, TransactionQueryFilter},
};

/// Inserts a new transaction in `pending` status. This is not atomic. Embed the call inside a transaction if you need
/// the hold on the subject to be placed with it, and pass `&mut *tx` as the connection argument.
pub async fn insert(tx: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, StoreError> {
    let id = tx.id.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                id,
                kind,
                subject_id,
                parent_subject_id,
                quantity,
                payer_ref,
                payee_ref,
                amount_gross_cents,
                commission_cents,
                amount_net_cents,
                funding_mode,
                partial_budget_cents,
                status,
                created_at,
                updated_at,
                expires_at,
                starts_at,
                ends_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending', $13, $13, $14, $15, $16)
            RETURNING *;
        "#,
    )
    .bind(tx.id)
    .bind(tx.kind)
    .bind(tx.subject_id)
    .bind(tx.parent_subject_id)
    .bind(tx.quantity)
    .bind(tx.payer_ref)
    .bind(tx.payee_ref)
    .bind(tx.amount_gross_cents)
    .bind(tx.commission_cents)
    .bind(tx.amount_net_cents)
    .bind(tx.funding_mode)
    .bind(tx.partial_budget_cents)
    .bind(tx.created_at)
    .bind(tx.expires_at)
    .bind(tx.starts_at)
    .bind(tx.ends_at)
    .fetch_one(conn)
    .await;
    match result {
        Ok(tx) => {
            debug!("🗃️ Transaction [{id}] inserted");
            Ok(tx)
        },
        Err(e) if is_unique_violation(&e) => Err(StoreError::TransactionAlreadyExists(id)),
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch(id: &TransactionId, conn: &mut SqliteConnection) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await
}

/// Fetches transactions according to the criteria in the `TransactionQueryFilter`, ordered by `created_at`.
pub async fn search(
    query: TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(statuses) = query.status.as_ref().filter(|s| !s.is_empty()) {
        where_clause.push(format!("status IN ({})", sql_list(statuses)));
    }
    if let Some(kind) = query.kind {
        where_clause.push("kind = ");
        where_clause.push_bind_unseparated(kind.to_string());
    }
    if let Some(mode) = query.funding_mode {
        where_clause.push("funding_mode = ");
        where_clause.push_bind_unseparated(mode.to_string());
    }
    if let Some(payer) = query.payer_ref {
        where_clause.push("payer_ref = ");
        where_clause.push_bind_unseparated(payer);
    }
    if let Some(payee) = query.payee_ref {
        where_clause.push("payee_ref = ");
        where_clause.push_bind_unseparated(payee);
    }
    if let Some(subject) = query.subject_id {
        where_clause.push("subject_id = ");
        where_clause.push_bind_unseparated(subject);
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Transaction>().fetch_all(conn).await
}

/// `pending → awaiting_external_payment`. Returns `None` if the transaction is no longer pending, or already carries a
/// reference.
pub async fn attach_reference(
    id: &TransactionId,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE transactions SET
            external_reference = $2,
            status = 'awaiting_external_payment',
            updated_at = $3
        WHERE id = $1 AND status = 'pending' AND external_reference IS NULL
        RETURNING *;
        "#,
    )
    .bind(id.as_str())
    .bind(reference)
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// Sets `budget_deducted` on a transaction in one of the `from` statuses, if it has not been set yet.
pub async fn mark_budget_deducted(
    id: &TransactionId,
    from: &[TransactionStatus],
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = format!(
        "UPDATE transactions SET budget_deducted = 1, updated_at = $2 WHERE id = $1 AND budget_deducted = 0 AND \
         partial_budget_cents > 0 AND status IN ({}) RETURNING *",
        sql_list(from)
    );
    sqlx::query_as(&sql).bind(id.as_str()).bind(now).fetch_optional(conn).await
}

/// The completion compare-and-swap. Moves an open transaction to `fulfilled`, or a boost to `active` or `scheduled`
/// depending on whether its window has started, filling in the external reference if it was not yet known.
/// Budget-funded transactions only move once their budget share has been deducted.
pub async fn complete(
    id: &TransactionId,
    reference: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let boosts = [TransactionKind::ProfileBoost, TransactionKind::EventBoost, TransactionKind::OfferBoost];
    let sql = format!(
        r#"
        UPDATE transactions SET
            status = CASE
                WHEN kind NOT IN ({boosts}) THEN 'fulfilled'
                WHEN starts_at IS NULL OR starts_at <= $3 THEN 'active'
                ELSE 'scheduled'
            END,
            external_reference = COALESCE(external_reference, $2),
            updated_at = $3
        WHERE id = $1
          AND status IN ({open})
          AND (funding_mode != '{budget}' OR budget_deducted = 1)
        RETURNING *;
        "#,
        boosts = sql_list(&boosts),
        open = sql_list(TransactionStatus::open_statuses()),
        budget = FundingMode::InternalBudget
    );
    sqlx::query_as(&sql).bind(id.as_str()).bind(reference).bind(now).fetch_optional(conn).await
}

/// A plain status compare-and-swap, recording `reason`.
pub async fn transition(
    id: &TransactionId,
    from: &[TransactionStatus],
    to: TransactionStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = format!(
        "UPDATE transactions SET status = $2, status_reason = COALESCE($3, status_reason), updated_at = $4 WHERE id = \
         $1 AND status IN ({}) RETURNING *",
        sql_list(from)
    );
    let result = sqlx::query_as(&sql)
        .bind(id.as_str())
        .bind(to.to_string())
        .bind(reason)
        .bind(now)
        .fetch_optional(conn)
        .await?;
    if result.is_some() {
        trace!("🗃️ Transaction [{id}] moved to {to}");
    }
    Ok(result)
}

/// `{pending, awaiting_external_payment} → expired`. Never expires a transaction whose budget share was taken: those
/// are paid for and must complete.
pub async fn expire(
    id: &TransactionId,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = format!(
        "UPDATE transactions SET status = 'expired', status_reason = $2, updated_at = $3 WHERE id = $1 AND \
         budget_deducted = 0 AND status IN ({}) RETURNING *",
        sql_list(TransactionStatus::open_statuses())
    );
    sqlx::query_as(&sql).bind(id.as_str()).bind(reason).bind(now).fetch_optional(conn).await
}

/// Any non-terminal status → `cancelled`. If `refund` is set, the refund request time is recorded.
pub async fn cancel(
    id: &TransactionId,
    reason: &str,
    refund: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE transactions SET
            status = 'cancelled',
            status_reason = $2,
            refund_requested_at = CASE WHEN $3 THEN $4 ELSE refund_requested_at END,
            updated_at = $4
        WHERE id = $1 AND status IN ({})
        RETURNING *;
        "#,
        sql_list(&[
            TransactionStatus::Pending,
            TransactionStatus::AwaitingExternalPayment,
            TransactionStatus::Flagged
        ])
    );
    sqlx::query_as(&sql).bind(id.as_str()).bind(reason).bind(refund).bind(now).fetch_optional(conn).await
}

/// `flagged → pending` (no session yet) or `flagged → awaiting_external_payment`.
pub async fn reopen_flagged(
    id: &TransactionId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE transactions SET
            status = CASE WHEN external_reference IS NULL THEN 'pending' ELSE 'awaiting_external_payment' END,
            updated_at = $2
        WHERE id = $1 AND status = 'flagged'
        RETURNING *;
        "#,
    )
    .bind(id.as_str())
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// `scheduled → active`, if the boost window has started.
pub async fn activate(
    id: &TransactionId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE transactions SET status = 'active', updated_at = $2 WHERE id = $1 AND status = 'scheduled' AND \
         starts_at <= $2 RETURNING *",
    )
    .bind(id.as_str())
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// `active → ended`, if the boost window has closed.
pub async fn end(
    id: &TransactionId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE transactions SET status = 'ended', updated_at = $2 WHERE id = $1 AND status = 'active' AND ends_at <= \
         $2 RETURNING *",
    )
    .bind(id.as_str())
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn reconciliation_candidates(
    window: SweepWindow,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let sql = format!(
        "SELECT * FROM transactions WHERE status IN ({}) AND created_at >= $1 AND created_at <= $2 ORDER BY \
         created_at ASC",
        sql_list(TransactionStatus::open_statuses())
    );
    sqlx::query_as(&sql).bind(window.oldest).bind(window.newest).fetch_all(conn).await
}

pub async fn abandoned(
    now: DateTime<Utc>,
    max_age: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let sql = format!(
        "SELECT * FROM transactions WHERE status IN ({}) AND ((expires_at IS NOT NULL AND expires_at < $1) OR \
         created_at < $2) ORDER BY created_at ASC",
        sql_list(TransactionStatus::open_statuses())
    );
    sqlx::query_as(&sql).bind(now).bind(now - max_age).fetch_all(conn).await
}

/// Cancelled rows with a session and a refund request, and no `refund` entry in the effect log.
pub async fn unconfirmed_refunds(
    requested_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM transactions t
        WHERE t.status = 'cancelled'
          AND t.external_reference IS NOT NULL
          AND t.refund_requested_at IS NOT NULL
          AND t.refund_requested_at < $1
          AND NOT EXISTS (SELECT 1 FROM effect_log e WHERE e.transaction_id = t.id AND e.effect = 'refund')
        ORDER BY t.refund_requested_at ASC
        "#,
    )
    .bind(requested_before)
    .fetch_all(conn)
    .await
}

pub async fn due_boosts(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT * FROM transactions
        WHERE (status = 'scheduled' AND starts_at <= $1)
           OR (status = 'active' AND ends_at <= $1)
        ORDER BY starts_at ASC
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await
}
