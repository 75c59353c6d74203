use activation_engine::{
    db_types::{Cents, FundingPreference, TransactionKind, TransactionStatus},
    engine_objects::{CheckoutOutcome, VerifiedPaymentFact, WebhookAck},
    test_utils::MockProcessor,
    BudgetLedger,
    CatalogManagement,
    CheckoutError,
    TransactionStore,
};
use chrono::{Duration, Utc};
use cucumber::{then, when};

use crate::cucumber::EngineWorld;

fn record(world: &mut EngineWorld, label: String, result: Result<CheckoutOutcome, CheckoutError>) {
    match result {
        Ok(outcome) => {
            world.orders.insert(label, outcome.transaction().id.clone());
            world.last_error = None;
        },
        Err(CheckoutError::Funding(e)) => {
            // A funding failure still leaves a pending row behind. Keep track of it.
            if let activation_engine::FundingError::SessionUnavailable { id, .. } = &e {
                world.orders.insert(label, id.clone());
            }
            world.last_error = Some(e.to_string());
        },
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "{word} buys {int} ticket(s) for tier {word} as order {word}")]
async fn buy_tickets(world: &mut EngineWorld, payer: String, quantity: i64, tier: String, label: String) {
    let result = world.system().checkout.checkout_ticket_order(&tier, &payer, quantity).await;
    record(world, label, result);
}

#[when(expr = "{word} buys offer {word} as order {word}")]
async fn buy_offer(world: &mut EngineWorld, payer: String, offer: String, label: String) {
    let result = world.system().checkout.checkout_offer_purchase(&offer, &payer).await;
    record(world, label, result);
}

#[when(expr = "{word} pays the deposit for reservation {word} as order {word}")]
async fn pay_deposit(world: &mut EngineWorld, payer: String, reservation: String, label: String) {
    let result = world.system().checkout.checkout_reservation(&reservation, &payer).await;
    record(world, label, result);
}

#[when(expr = "{word} buys a {int} day profile boost starting in {int} hour(s) from the budget as order {word}")]
async fn buy_boost(world: &mut EngineWorld, business: String, days: u32, hours: i64, label: String) {
    let starts = Utc::now() + Duration::hours(hours);
    let funding = FundingPreference::BudgetFirst;
    let result = world
        .system()
        .checkout
        .checkout_boost(TransactionKind::ProfileBoost, &business, &business, starts, days, funding)
        .await;
    record(world, label, result);
}

#[when(expr = "the payer completes the checkout for order {word}")]
async fn payer_pays(world: &mut EngineWorld, label: String) {
    let tx = world.order(&label).await;
    let reference = tx.external_reference.expect("Order has no payment session");
    world.system().processor.pay(&reference).expect("No such session");
}

#[when(expr = "the processor reports a payment of {int} cents for order {word}")]
async fn wrong_amount(world: &mut EngineWorld, amount: i64, label: String) {
    let tx = world.order(&label).await;
    let reference = tx.external_reference.expect("Order has no payment session");
    world.system().processor.pay_amount(&reference, Cents::from(amount)).expect("No such session");
    let fact = VerifiedPaymentFact::new(Cents::from(amount), &reference);
    if let Err(e) = world.system().completion.complete(&tx.id, fact).await {
        world.last_error = Some(e.to_string());
    }
}

#[when(expr = "the payment webhook for order {word} arrives")]
async fn payment_webhook(world: &mut EngineWorld, label: String) {
    let tx = world.order(&label).await;
    let reference = tx.external_reference.expect("Order has no payment session");
    let event_id = world.next_event_id();
    let payload = world.system().processor.completed_event(&event_id, &reference).expect("No such session");
    let ack = world.system().webhooks.handle_webhook_event(&payload, MockProcessor::SIGNATURE).await;
    assert_eq!(ack.expect("Webhook was rejected"), WebhookAck::Processed);
}

#[when(expr = "the checkout session for order {word} expires")]
async fn session_expires(world: &mut EngineWorld, label: String) {
    let tx = world.order(&label).await;
    let reference = tx.external_reference.expect("Order has no payment session");
    world.system().processor.expire(&reference).expect("No such session");
}

#[when("the reconciliation sweep runs")]
async fn sweep(world: &mut EngineWorld) {
    let summary = world.system().sweeper.run_sweep(Utc::now() + Duration::seconds(1)).await;
    assert_eq!(summary.errors, 0, "Sweep reported errors: {summary:?}");
}

#[when(expr = "the reconciliation sweep runs {int} hours from now")]
async fn late_sweep(world: &mut EngineWorld, hours: i64) {
    world.system().sweeper.run_sweep(Utc::now() + Duration::hours(hours)).await;
}

#[when(expr = "the activation scheduler runs {int} hours from now")]
async fn activations(world: &mut EngineWorld, hours: i64) {
    world.system().activations.schedule_activations(Utc::now() + Duration::hours(hours)).await;
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut EngineWorld, label: String, status: String) {
    let expected = status.parse::<TransactionStatus>().expect("Unknown status");
    let tx = world.order(&label).await;
    assert_eq!(tx.status, expected, "Order {label} has the wrong status. Reason: {:?}", tx.status_reason);
}

#[then(expr = "order {word} has a gross of {int}, commission of {int} and net of {int} cents")]
async fn order_amounts(world: &mut EngineWorld, label: String, gross: i64, commission: i64, net: i64) {
    let tx = world.order(&label).await;
    assert_eq!(tx.amount_gross_cents, Cents::from(gross));
    assert_eq!(tx.commission_cents, Cents::from(commission));
    assert_eq!(tx.amount_net_cents, Cents::from(net));
}

#[then(expr = "order {word} holds {int} ticket(s)")]
async fn ticket_count(world: &mut EngineWorld, label: String, count: usize) {
    let id = world.order_id(&label);
    let tickets = world.system().db.fetch_tickets(&id).await.expect("Error fetching tickets");
    assert_eq!(tickets.len(), count);
}

#[then(expr = "tier {word} has sold {int} ticket(s)")]
async fn tier_sold(world: &mut EngineWorld, tier: String, count: i64) {
    let tier = world.system().db.fetch_ticket_tier(&tier).await.unwrap().expect("No such tier");
    assert_eq!(tier.quantity_sold, count);
}

#[then(expr = "business {word} has {int} settlement(s) totalling {int} cents net")]
async fn settlements(world: &mut EngineWorld, business: String, count: usize, net: i64) {
    let entries = world.system().db.settlements_for_business(&business).await.unwrap();
    assert_eq!(entries.len(), count);
    let total: Cents = entries.iter().map(|e| e.net_cents).sum();
    assert_eq!(total, Cents::from(net));
}

#[then(expr = "the budget of {word} is {int} cents")]
async fn budget_remaining(world: &mut EngineWorld, business: String, cents: i64) {
    let ledger = world.system().db.fetch_ledger(&business).await.unwrap().expect("No ledger");
    assert_eq!(ledger.monthly_budget_remaining_cents, Cents::from(cents));
}

#[then(expr = "reservation {word} is {word}")]
async fn reservation_status(world: &mut EngineWorld, id: String, status: String) {
    let reservation = world.system().db.fetch_reservation(&id).await.unwrap().expect("No such reservation");
    assert_eq!(reservation.status.to_string(), status);
}

#[then(expr = "the checkout fails with {string}")]
async fn checkout_failed(world: &mut EngineWorld, fragment: String) {
    let err = world.last_error.as_deref().expect("The last step did not fail");
    assert!(err.contains(&fragment), "Expected an error containing '{fragment}', got '{err}'");
}

#[then(expr = "a refund of {int} cents is requested for order {word}")]
async fn refund_requested(world: &mut EngineWorld, amount: i64, label: String) {
    let tx = world.order(&label).await;
    assert!(tx.refund_requested_at.is_some(), "No refund was requested for {label}");
    let events = crate::support::wait_for(&world.system().cancelled, 1).await;
    let refund = events
        .iter()
        .find(|e| e.transaction.id == tx.id)
        .and_then(|e| e.refund.clone())
        .expect("No refund signal was published");
    assert_eq!(refund.amount, Cents::from(amount));
}
