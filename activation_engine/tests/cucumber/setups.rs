use activation_engine::{
    db_types::PlanTier,
    test_utils::seed::{seed_business, seed_event, seed_ledger, seed_offer, seed_reservation, seed_ticket_tier},
};
use chrono::{Duration, Utc};
use cucumber::given;

use crate::{cucumber::EngineWorld, support::Harness};

#[given("a fresh engine")]
async fn fresh_engine(world: &mut EngineWorld) {
    world.system = Some(Harness::new().await);
}

#[given(expr = "business {word} on the {word} plan")]
async fn business(world: &mut EngineWorld, id: String, plan: String) {
    let plan = plan.parse::<PlanTier>().expect("Unknown plan tier");
    seed_business(&world.system().db, &id, plan).await;
}

#[given(expr = "business {word} has a budget of {int} cents and {int} commission-free offers")]
async fn budget(world: &mut EngineWorld, id: String, budget_cents: i64, offers: i64) {
    seed_ledger(&world.system().db, &id, budget_cents, offers, Utc::now() - Duration::days(1)).await;
}

#[given(expr = "event {word} by {word} sells tier {word} at {int} cents with {int} seats")]
async fn ticket_tier(world: &mut EngineWorld, event: String, business: String, tier: String, price: i64, seats: i64) {
    let db = &world.system().db;
    seed_event(db, &event, &business).await;
    seed_ticket_tier(db, &tier, &event, &business, price, seats).await;
}

#[given(expr = "offer {word} by {word} at {int} cents with {int}% off")]
async fn offer(world: &mut EngineWorld, offer_id: String, business: String, price: i64, discount: i64) {
    seed_offer(&world.system().db, &offer_id, &business, price, discount, None).await;
}

#[given(expr = "reservation {word} at {word} for {word} with a deposit of {int} cents")]
async fn reservation(world: &mut EngineWorld, id: String, business: String, customer: String, deposit: i64) {
    seed_reservation(&world.system().db, &id, &business, &customer, deposit).await;
}
