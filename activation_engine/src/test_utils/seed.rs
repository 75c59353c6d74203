//! Catalog fixtures.
use chrono::{DateTime, Duration, Utc};

use crate::{
    db_types::{Business, Cents, Event, Offer, PlanTier, Reservation, ReservationStatus, TicketTier},
    traits::{BudgetLedger, CatalogManagement},
    SqliteDatabase,
};

pub async fn seed_business(db: &SqliteDatabase, id: &str, plan: PlanTier) -> Business {
    let business = Business { id: id.to_string(), plan_tier: plan, payout_account: Some(format!("acct_{id}")) };
    db.upsert_business(business.clone()).await.expect("Error seeding business");
    business
}

pub async fn seed_event(db: &SqliteDatabase, id: &str, business_id: &str) -> Event {
    let event = Event { id: id.to_string(), business_id: business_id.to_string(), title: format!("Event {id}") };
    db.upsert_event(event.clone()).await.expect("Error seeding event");
    event
}

pub async fn seed_ticket_tier(
    db: &SqliteDatabase,
    id: &str,
    event_id: &str,
    business_id: &str,
    price: i64,
    capacity: i64,
) -> TicketTier {
    let tier = TicketTier {
        id: id.to_string(),
        event_id: event_id.to_string(),
        business_id: business_id.to_string(),
        price_cents: Cents::from(price),
        capacity,
        quantity_sold: 0,
        per_user_limit: None,
        sales_start: None,
        sales_end: None,
    };
    db.upsert_ticket_tier(tier.clone()).await.expect("Error seeding ticket tier");
    tier
}

pub async fn seed_reservation(
    db: &SqliteDatabase,
    id: &str,
    business_id: &str,
    customer: &str,
    deposit: i64,
) -> Reservation {
    let reservation = Reservation {
        id: id.to_string(),
        business_id: business_id.to_string(),
        customer: customer.to_string(),
        deposit_cents: Cents::from(deposit),
        status: ReservationStatus::Requested,
    };
    db.upsert_reservation(reservation.clone()).await.expect("Error seeding reservation");
    reservation
}

pub async fn seed_offer(
    db: &SqliteDatabase,
    id: &str,
    business_id: &str,
    price: i64,
    discount_percent: i64,
    stock: Option<i64>,
) -> Offer {
    let offer = Offer {
        id: id.to_string(),
        business_id: business_id.to_string(),
        original_price_cents: Cents::from(price),
        discount_percent,
        stock,
        quantity_sold: 0,
        per_user_limit: None,
        valid_from: None,
        valid_until: None,
        commission_free: false,
    };
    db.upsert_offer(offer.clone()).await.expect("Error seeding offer");
    offer
}

/// Gives the business a ledger for the month starting at `start`.
pub async fn seed_ledger(db: &SqliteDatabase, business_id: &str, budget: i64, offers: i64, start: DateTime<Utc>) {
    db.reset(business_id, Cents::from(budget), offers, start, start + Duration::days(30))
        .await
        .expect("Error seeding budget ledger");
}
