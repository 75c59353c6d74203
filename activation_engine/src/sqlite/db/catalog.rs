//! Reads and conditional writes against the catalog tables the engine touches.
//!
//! Inventory counters are only ever moved by the guarded `UPDATE`s in this module, which report whether the guard
//! held. The callers run them inside the completion transaction and roll back when a guard fails.
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use super::sql_list;
use crate::{
    db_types::{
        Business,
        Event,
        Offer,
        OfferPurchase,
        PlanTier,
        PurchaseStatus,
        Reservation,
        ReservationStatus,
        Ticket,
        TicketTier,
        TransactionId,
        TransactionKind,
        TransactionStatus,
    },
    helpers::new_ticket_code,
};

pub async fn fetch_business(id: &str, conn: &mut SqliteConnection) -> Result<Option<Business>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM businesses WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_event(id: &str, conn: &mut SqliteConnection) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM events WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_ticket_tier(id: &str, conn: &mut SqliteConnection) -> Result<Option<TicketTier>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ticket_tiers WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_reservation(id: &str, conn: &mut SqliteConnection) -> Result<Option<Reservation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM reservations WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_offer(id: &str, conn: &mut SqliteConnection) -> Result<Option<Offer>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM offers WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_offer_purchase(
    id: &TransactionId,
    conn: &mut SqliteConnection,
) -> Result<Option<OfferPurchase>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM offer_purchases WHERE transaction_id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_tickets(id: &TransactionId, conn: &mut SqliteConnection) -> Result<Vec<Ticket>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tickets WHERE transaction_id = $1 ORDER BY code")
        .bind(id.as_str())
        .fetch_all(conn)
        .await
}

/// Issued tickets held by `payer` for the tier, plus the quantities in their open orders for it.
pub async fn tickets_committed_to_payer(
    tier_id: &str,
    payer: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT
            (SELECT COUNT(*) FROM tickets WHERE tier_id = $1 AND holder = $2) +
            (SELECT COALESCE(SUM(quantity), 0) FROM transactions
                WHERE kind = '{}' AND subject_id = $1 AND payer_ref = $2 AND status IN ({}))
        "#,
        TransactionKind::TicketOrder,
        sql_list(TransactionStatus::open_statuses())
    );
    sqlx::query_scalar(&sql).bind(tier_id).bind(payer).fetch_one(conn).await
}

pub async fn offer_purchases_by_payer(
    offer_id: &str,
    payer: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM offer_purchases WHERE offer_id = $1 AND payer = $2 AND status IN ({})",
        sql_list(&[PurchaseStatus::Pending, PurchaseStatus::Paid])
    );
    sqlx::query_scalar(&sql).bind(offer_id).bind(payer).fetch_one(conn).await
}

/// Purchases of the offer that are still waiting for payment. These count against stock during validation.
pub async fn pending_offer_purchases(offer_id: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM offer_purchases WHERE offer_id = $1 AND status = 'pending'")
        .bind(offer_id)
        .fetch_one(conn)
        .await
}

//-------------------------------------------       Upserts        ---------------------------------------------------
pub async fn upsert_business(business: Business, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO businesses (id, plan_tier, payout_account) VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET plan_tier = excluded.plan_tier, payout_account = excluded.payout_account
        "#,
    )
    .bind(business.id)
    .bind(business.plan_tier)
    .bind(business.payout_account)
    .execute(conn)
    .await?;
    Ok(())
}

/// Returns `false` if the business does not exist.
pub async fn set_plan_tier(
    business_id: &str,
    plan: PlanTier,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE businesses SET plan_tier = $2 WHERE id = $1")
        .bind(business_id)
        .bind(plan)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn upsert_event(event: Event, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO events (id, business_id, title) VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET business_id = excluded.business_id, title = excluded.title
        "#,
    )
    .bind(event.id)
    .bind(event.business_id)
    .bind(event.title)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_ticket_tier(tier: TicketTier, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ticket_tiers (
            id, event_id, business_id, price_cents, capacity, quantity_sold, per_user_limit, sales_start, sales_end
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            event_id = excluded.event_id,
            business_id = excluded.business_id,
            price_cents = excluded.price_cents,
            capacity = excluded.capacity,
            quantity_sold = excluded.quantity_sold,
            per_user_limit = excluded.per_user_limit,
            sales_start = excluded.sales_start,
            sales_end = excluded.sales_end
        "#,
    )
    .bind(tier.id)
    .bind(tier.event_id)
    .bind(tier.business_id)
    .bind(tier.price_cents)
    .bind(tier.capacity)
    .bind(tier.quantity_sold)
    .bind(tier.per_user_limit)
    .bind(tier.sales_start)
    .bind(tier.sales_end)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_reservation(reservation: Reservation, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reservations (id, business_id, customer, deposit_cents, status) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET
            business_id = excluded.business_id,
            customer = excluded.customer,
            deposit_cents = excluded.deposit_cents,
            status = excluded.status
        "#,
    )
    .bind(reservation.id)
    .bind(reservation.business_id)
    .bind(reservation.customer)
    .bind(reservation.deposit_cents)
    .bind(reservation.status)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_offer(offer: Offer, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO offers (
            id, business_id, original_price_cents, discount_percent, stock, quantity_sold, per_user_limit,
            valid_from, valid_until, commission_free
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            business_id = excluded.business_id,
            original_price_cents = excluded.original_price_cents,
            discount_percent = excluded.discount_percent,
            stock = excluded.stock,
            quantity_sold = excluded.quantity_sold,
            per_user_limit = excluded.per_user_limit,
            valid_from = excluded.valid_from,
            valid_until = excluded.valid_until,
            commission_free = excluded.commission_free
        "#,
    )
    .bind(offer.id)
    .bind(offer.business_id)
    .bind(offer.original_price_cents)
    .bind(offer.discount_percent)
    .bind(offer.stock)
    .bind(offer.quantity_sold)
    .bind(offer.per_user_limit)
    .bind(offer.valid_from)
    .bind(offer.valid_until)
    .bind(offer.commission_free)
    .execute(conn)
    .await?;
    Ok(())
}

//-------------------------------------------     Reservations     ---------------------------------------------------
async fn move_reservation(
    id: &str,
    from: &[ReservationStatus],
    to: ReservationStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let sql = format!("UPDATE reservations SET status = $2 WHERE id = $1 AND status IN ({})", sql_list(from));
    let result = sqlx::query(&sql).bind(id).bind(to).execute(conn).await?;
    let moved = result.rows_affected() == 1;
    if moved {
        debug!("🗃️ Reservation {id} is now {to}");
    }
    Ok(moved)
}

/// `requested → payment_pending`.
pub async fn hold_reservation(id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    move_reservation(id, &[ReservationStatus::Requested], ReservationStatus::PaymentPending, conn).await
}

/// `payment_pending → requested`, so the customer can pay again.
pub async fn release_reservation(id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    move_reservation(id, &[ReservationStatus::PaymentPending], ReservationStatus::Requested, conn).await
}

/// Accepts a reservation that is not already accepted or cancelled.
pub async fn accept_reservation(id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    move_reservation(
        id,
        &[ReservationStatus::Requested, ReservationStatus::PaymentPending],
        ReservationStatus::Accepted,
        conn,
    )
    .await
}

//-------------------------------------------    Offer purchases   ---------------------------------------------------
pub async fn insert_offer_purchase(
    id: &TransactionId,
    offer_id: &str,
    payer: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO offer_purchases (transaction_id, offer_id, payer, status, created_at) VALUES ($1, $2, $3, \
         'pending', $4)",
    )
    .bind(id.as_str())
    .bind(offer_id)
    .bind(payer)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// `pending → paid`, attaching the redemption token. Returns `None` if the purchase was not pending.
pub async fn mark_purchase_paid(
    id: &TransactionId,
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OfferPurchase>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE offer_purchases SET status = 'paid', redemption_token = $2 WHERE transaction_id = $1 AND status = \
         'pending' AND redemption_token IS NULL RETURNING *",
    )
    .bind(id.as_str())
    .bind(token)
    .fetch_optional(conn)
    .await
}

/// `pending → expired | cancelled`.
pub async fn close_pending_purchase(
    id: &TransactionId,
    to: PurchaseStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE offer_purchases SET status = $2 WHERE transaction_id = $1 AND status = 'pending'")
            .bind(id.as_str())
            .bind(to)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks the offer commission-free. Returns `false` if it already was, or does not belong to the business.
pub async fn mark_offer_commission_free(
    offer_id: &str,
    business_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE offers SET commission_free = 1 WHERE id = $1 AND business_id = $2 AND commission_free = 0",
    )
    .bind(offer_id)
    .bind(business_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

//-------------------------------------------       Inventory      ---------------------------------------------------
/// Sells one unit of the offer, if stock remains.
pub async fn increment_offer_sold(offer_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE offers SET quantity_sold = quantity_sold + 1 WHERE id = $1 AND (stock IS NULL OR quantity_sold < \
         stock)",
    )
    .bind(offer_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Sells `quantity` units of the tier, if that much capacity remains.
pub async fn increment_tier_sold(
    tier_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE ticket_tiers SET quantity_sold = quantity_sold + $2 WHERE id = $1 AND quantity_sold + $2 <= capacity",
    )
    .bind(tier_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_tickets(
    id: &TransactionId,
    tier_id: &str,
    holder: &str,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Ticket>, sqlx::Error> {
    let mut tickets = Vec::with_capacity(quantity.max(0) as usize);
    for _ in 0..quantity {
        let ticket: Ticket = sqlx::query_as(
            "INSERT INTO tickets (code, transaction_id, tier_id, holder, created_at) VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(new_ticket_code())
        .bind(id.as_str())
        .bind(tier_id)
        .bind(holder)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        tickets.push(ticket);
    }
    debug!("🗃️ Issued {} tickets for tier {tier_id} on [{id}]", tickets.len());
    Ok(tickets)
}
