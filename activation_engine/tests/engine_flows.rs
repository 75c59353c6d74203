mod support;

use activation_engine::{
    db_types::{
        Cents,
        EffectType,
        FundingMode,
        FundingPreference,
        NewTransaction,
        PlanTier,
        PurchaseStatus,
        ReservationStatus,
        TransactionKind,
        TransactionStatus,
    },
    engine_objects::{CompletionOutcome, Resolution, VerifiedPaymentFact, WebhookAck},
    test_utils::{
        seed::{seed_event, seed_ledger, seed_offer, seed_reservation, seed_ticket_tier},
        MockProcessor,
    },
    traits::{BudgetReservation, SessionState, TransactionQueryFilter},
    BudgetLedger,
    CatalogManagement,
    CheckoutApi,
    CheckoutError,
    CompletionError,
    FundingError,
    TransactionStore,
    ValidationError,
    PLATFORM_PAYEE,
};
use chrono::{Duration, Utc};
use support::{wait_for, Harness};

#[tokio::test]
async fn offer_purchase_completes_exactly_once() {
    let h = Harness::new().await.with_business("cafe", PlanTier::Basic).await;
    seed_offer(&h.db, "latte", "cafe", 1000, 20, Some(10)).await;

    let outcome = h.checkout.checkout_offer_purchase("latte", "alice").await.expect("Checkout failed");
    let tx = outcome.transaction().clone();
    assert!(outcome.redirect_url().is_some());
    assert_eq!(tx.status, TransactionStatus::AwaitingExternalPayment);
    assert_eq!(tx.amount_gross_cents, Cents::from(800));
    assert_eq!(tx.commission_cents, Cents::from(96));
    assert_eq!(tx.amount_net_cents, Cents::from(704));

    let reference = tx.external_reference.clone().expect("No session attached");
    let session = h.processor.session(&reference).expect("Session not created");
    let split = session.request.split.expect("Offer sessions carry a split");
    assert_eq!(split.destination, "acct_cafe");
    assert_eq!(split.application_fee, Cents::from(96));

    h.processor.pay(&reference);
    let fact = VerifiedPaymentFact::new(Cents::from(800), &reference);
    let first = h.completion.complete(&tx.id, fact.clone()).await.expect("First completion failed");
    let second = h.completion.complete(&tx.id, fact).await.expect("Second completion failed");
    assert!(matches!(first, CompletionOutcome::Completed(_)));
    assert!(matches!(second, CompletionOutcome::AlreadyTerminal(_)));
    assert_eq!(first.transaction().status, TransactionStatus::Fulfilled);

    let purchase = h.db.fetch_offer_purchase(&tx.id).await.unwrap().expect("No purchase row");
    assert_eq!(purchase.status, PurchaseStatus::Paid);
    assert!(purchase.redemption_token.is_some());
    let offer = h.db.fetch_offer("latte").await.unwrap().unwrap();
    assert_eq!(offer.quantity_sold, 1);

    let settlements = h.db.settlements_for_business("cafe").await.unwrap();
    assert_eq!(settlements.len(), 1);
    assert_eq!(settlements[0].gross_cents, Cents::from(800));
    assert_eq!(settlements[0].commission_cents, Cents::from(96));
    assert_eq!(settlements[0].net_cents, Cents::from(704));

    let effects = h.db.effects_for_transaction(&tx.id).await.unwrap();
    assert_eq!(effects.iter().filter(|e| e.effect == EffectType::Fulfilment).count(), 1);
    assert_eq!(wait_for(&h.fulfilled, 1).await.len(), 1);
}

#[tokio::test]
async fn concurrent_budget_deductions_never_overdraw() {
    let h = Harness::new().await.with_business("bistro", PlanTier::Pro).await;
    seed_ledger(&h.db, "bistro", 5000, 0, Utc::now() - Duration::days(1)).await;
    let starts = Utc::now() + Duration::days(1);
    let boost = || {
        NewTransaction::new(TransactionKind::ProfileBoost, "bistro", "bistro", PLATFORM_PAYEE)
            .with_amounts(Cents::from(3000), Cents::from(3000))
            .with_funding(FundingMode::InternalBudget, Cents::from(3000))
            .with_window(starts, starts + Duration::days(6))
    };
    let a = h.db.insert_transaction(boost()).await.unwrap();
    let b = h.db.insert_transaction(boost()).await.unwrap();

    let (ra, rb) =
        tokio::join!(h.db.reserve_budget_for_transaction(&a.id), h.db.reserve_budget_for_transaction(&b.id));
    let results = [ra.unwrap(), rb.unwrap()];
    let reserved = results.iter().filter(|r| matches!(r, BudgetReservation::Reserved(_))).count();
    let refused = results.iter().filter(|r| matches!(r, BudgetReservation::Insufficient)).count();
    assert_eq!(reserved, 1);
    assert_eq!(refused, 1);

    let ledger = h.db.fetch_ledger("bistro").await.unwrap().unwrap();
    assert_eq!(ledger.monthly_budget_remaining_cents, Cents::from(2000));
    let loser = if matches!(results[0], BudgetReservation::Insufficient) { &a.id } else { &b.id };
    let loser = h.db.fetch_transaction(loser).await.unwrap().unwrap();
    assert_eq!(loser.status, TransactionStatus::Pending);
    assert!(!loser.budget_deducted);

    // A replay of the winning deduction changes nothing.
    let winner = if matches!(results[0], BudgetReservation::Reserved(_)) { &a.id } else { &b.id };
    let replay = h.db.reserve_budget_for_transaction(winner).await.unwrap();
    assert!(matches!(replay, BudgetReservation::AlreadyReserved(_)));
    let ledger = h.db.fetch_ledger("bistro").await.unwrap().unwrap();
    assert_eq!(ledger.monthly_budget_remaining_cents, Cents::from(2000));
}

#[tokio::test]
async fn budget_funded_boost_checkout() {
    let h = Harness::new().await.with_business("bistro", PlanTier::Pro).await;
    seed_ledger(&h.db, "bistro", 5000, 0, Utc::now() - Duration::days(1)).await;
    let starts = Utc::now() + Duration::days(1);

    // 6 days at 500 per day, fully covered by the budget
    let outcome = h
        .checkout
        .checkout_boost(TransactionKind::ProfileBoost, "bistro", "bistro", starts, 6, FundingPreference::BudgetFirst)
        .await
        .expect("Boost checkout failed");
    let tx = outcome.transaction();
    assert!(outcome.redirect_url().is_none());
    assert_eq!(tx.funding_mode, FundingMode::InternalBudget);
    assert_eq!(tx.status, TransactionStatus::Scheduled);
    assert_eq!(tx.commission_cents, Cents::from(3000));
    assert_eq!(tx.amount_net_cents, Cents::zero());
    assert!(h.db.settlements_for_business(PLATFORM_PAYEE).await.unwrap().is_empty());

    // The 2000 left covers part of the next one. The rest goes to the processor.
    let outcome = h
        .checkout
        .checkout_boost(TransactionKind::ProfileBoost, "bistro", "bistro", starts, 6, FundingPreference::BudgetFirst)
        .await
        .expect("Boost checkout failed");
    let tx = outcome.transaction();
    assert!(outcome.redirect_url().is_some());
    assert_eq!(tx.funding_mode, FundingMode::Mixed);
    assert_eq!(tx.partial_budget_cents, Cents::from(2000));
    assert_eq!(tx.external_amount(), Cents::from(1000));
    let session = h.processor.session_for(&tx.id).expect("No session");
    assert_eq!(session.request.amount, Cents::from(1000));
    assert!(session.request.split.is_none());
}

#[tokio::test]
async fn last_ticket_goes_to_the_first_completion() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_event(&h.db, "gig", "venue").await;
    seed_ticket_tier(&h.db, "floor", "gig", "venue", 2500, 1).await;

    let (a, b) = tokio::join!(
        h.checkout.checkout_ticket_order("floor", "alice", 1),
        h.checkout.checkout_ticket_order("floor", "bob", 1)
    );
    let a = a.expect("Alice's checkout failed").transaction().clone();
    let b = b.expect("Bob's checkout failed").transaction().clone();
    let ref_a = a.external_reference.clone().unwrap();
    let ref_b = b.external_reference.clone().unwrap();
    h.processor.pay(&ref_a);
    h.processor.pay(&ref_b);

    let first = h.completion.complete(&a.id, VerifiedPaymentFact::new(Cents::from(2500), &ref_a)).await;
    assert!(matches!(first, Ok(CompletionOutcome::Completed(_))));
    let second = h.completion.complete(&b.id, VerifiedPaymentFact::new(Cents::from(2500), &ref_b)).await;
    assert!(matches!(second, Err(CompletionError::InventoryExhausted { .. })));

    let b = h.db.fetch_transaction(&b.id).await.unwrap().unwrap();
    assert_eq!(b.status, TransactionStatus::Cancelled);
    assert!(b.refund_requested_at.is_some());
    assert_eq!(h.db.fetch_tickets(&a.id).await.unwrap().len(), 1);
    assert!(h.db.fetch_tickets(&b.id).await.unwrap().is_empty());
    let tier = h.db.fetch_ticket_tier("floor").await.unwrap().unwrap();
    assert_eq!(tier.quantity_sold, 1);

    let cancelled = wait_for(&h.cancelled, 1).await;
    assert_eq!(cancelled.len(), 1);
    let refund = cancelled[0].refund.clone().expect("No refund signal");
    assert_eq!(refund.external_reference, ref_b);
    assert_eq!(refund.amount, Cents::from(2500));
}

#[tokio::test]
async fn webhook_and_sweep_race_for_the_same_payment() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_event(&h.db, "gig", "venue").await;
    seed_ticket_tier(&h.db, "balcony", "gig", "venue", 1000, 50).await;

    let tx = h.checkout.checkout_ticket_order("balcony", "carol", 2).await.unwrap().transaction().clone();
    let reference = tx.external_reference.clone().unwrap();
    h.processor.pay(&reference);
    let payload = h.processor.completed_event("evt_1", &reference).unwrap();

    let now = Utc::now() + Duration::seconds(1);
    let (ack, summary) = tokio::join!(
        h.webhooks.handle_webhook_event(&payload, MockProcessor::SIGNATURE),
        h.sweeper.run_sweep(now)
    );
    assert_eq!(ack.expect("Webhook was rejected"), WebhookAck::Processed);
    // The sweep may or may not still see the transaction open, depending on who got there first
    assert!(summary.reconciled + summary.already_terminal <= 1);
    assert_eq!(summary.errors, 0);

    let tx = h.db.fetch_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Fulfilled);
    assert_eq!(h.db.fetch_tickets(&tx.id).await.unwrap().len(), 2);
    assert_eq!(h.db.settlements_for_business("venue").await.unwrap().len(), 1);
    let tier = h.db.fetch_ticket_tier("balcony").await.unwrap().unwrap();
    assert_eq!(tier.quantity_sold, 2);
    wait_for(&h.fulfilled, 1).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.fulfilled.lock().unwrap().len(), 1);

    // Redelivery is acknowledged without touching anything
    let ack = h.webhooks.handle_webhook_event(&payload, MockProcessor::SIGNATURE).await.unwrap();
    assert_eq!(ack, WebhookAck::Duplicate);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_completions_apply_effects_once() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_event(&h.db, "gig", "venue").await;
    seed_ticket_tier(&h.db, "stalls", "gig", "venue", 1500, 20).await;
    let tx = h.checkout.checkout_ticket_order("stalls", "dora", 3).await.unwrap().transaction().clone();
    let reference = tx.external_reference.clone().unwrap();
    h.processor.pay(&reference);

    let fact = VerifiedPaymentFact::new(tx.external_amount(), &reference);
    let tasks = (0..2).map(|_| {
        let completion = h.completion.clone();
        let id = tx.id.clone();
        let fact = fact.clone();
        tokio::spawn(async move { completion.complete(&id, fact).await })
    });
    let mut outcomes = Vec::new();
    for task in tasks.collect::<Vec<_>>() {
        outcomes.push(task.await.expect("Task panicked").expect("Completion failed"));
    }
    let completed = outcomes.iter().filter(|o| matches!(o, CompletionOutcome::Completed(_))).count();
    let already = outcomes.iter().filter(|o| matches!(o, CompletionOutcome::AlreadyTerminal(_))).count();
    assert_eq!(completed, 1);
    assert_eq!(already, 1);

    assert_eq!(h.db.fetch_tickets(&tx.id).await.unwrap().len(), 3);
    assert_eq!(h.db.settlements_for_business("venue").await.unwrap().len(), 1);
    let effects = h.db.effects_for_transaction(&tx.id).await.unwrap();
    assert_eq!(effects.iter().filter(|e| e.effect == EffectType::Fulfilment).count(), 1);
    let tier = h.db.fetch_ticket_tier("stalls").await.unwrap().unwrap();
    assert_eq!(tier.quantity_sold, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_budget_boosts_never_overdraw() {
    let h = Harness::new().await.with_business("bistro", PlanTier::Pro).await;
    seed_ledger(&h.db, "bistro", 5000, 0, Utc::now() - Duration::days(1)).await;
    let starts = Utc::now() + Duration::days(1);

    // Each boost costs 3000, so the budget covers exactly one of them in full
    let tasks = (0..2).map(|_| {
        let checkout = CheckoutApi::new(h.processor.clone(), h.completion.clone());
        tokio::spawn(async move {
            let preference = FundingPreference::BudgetFirst;
            checkout.checkout_boost(TransactionKind::ProfileBoost, "bistro", "bistro", starts, 6, preference).await
        })
    });
    let mut results = Vec::new();
    for task in tasks.collect::<Vec<_>>() {
        results.push(task.await.expect("Task panicked"));
    }

    let funded = results
        .iter()
        .filter(|r| matches!(r, Ok(o) if o.transaction().funding_mode == FundingMode::InternalBudget))
        .count();
    assert_eq!(funded, 1, "Exactly one boost is paid for entirely from the budget");
    for result in &results {
        match result {
            Ok(o) if o.transaction().funding_mode == FundingMode::InternalBudget => {
                assert_eq!(o.transaction().status, TransactionStatus::Scheduled);
            },
            // Saw the full budget before the winner deducted it
            Err(CheckoutError::Funding(FundingError::InsufficientBudget { business_id, required })) => {
                assert_eq!(business_id, "bistro");
                assert_eq!(*required, Cents::from(3000));
            },
            // Saw the budget after the winner deducted it, and topped up from the processor
            Ok(o) => {
                assert_eq!(o.transaction().funding_mode, FundingMode::Mixed);
                assert_eq!(o.transaction().partial_budget_cents, Cents::from(2000));
                assert!(o.redirect_url().is_some());
            },
            Err(e) => panic!("Unexpected checkout failure: {e:?}"),
        }
    }
    let ledger = h.db.fetch_ledger("bistro").await.unwrap().unwrap();
    assert_eq!(ledger.monthly_budget_remaining_cents, Cents::from(2000));
}

#[tokio::test]
async fn amount_mismatch_flags_and_operator_retry() {
    let h = Harness::new().await.with_business("venue", PlanTier::Premium).await;
    seed_reservation(&h.db, "table-7", "venue", "dave", 2000).await;

    let tx = h.checkout.checkout_reservation("table-7", "dave").await.unwrap().transaction().clone();
    let reference = tx.external_reference.clone().unwrap();
    let reservation = h.db.fetch_reservation("table-7").await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::PaymentPending);

    let fact = VerifiedPaymentFact::new(Cents::from(1999), &reference);
    let err = h.completion.complete(&tx.id, fact).await.unwrap_err();
    assert!(err.is_integrity_failure());
    let flagged = h.db.fetch_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(flagged.status, TransactionStatus::Flagged);
    assert!(h.db.effects_for_transaction(&tx.id).await.unwrap().is_empty());
    assert_eq!(wait_for(&h.flagged, 1).await.len(), 1);

    // Fenced: even the right amount cannot complete it now
    let fenced = h.completion.complete(&tx.id, VerifiedPaymentFact::new(Cents::from(2000), &reference)).await;
    assert!(matches!(fenced, Err(CompletionError::Fenced(_))));
    let listed = h.admin.flagged_transactions().await.unwrap();
    assert_eq!(listed.len(), 1);

    let reopened = h.admin.resolve_flagged(&tx.id, Resolution::Retry).await.unwrap();
    assert_eq!(reopened.status, TransactionStatus::AwaitingExternalPayment);
    let done = h.completion.complete(&tx.id, VerifiedPaymentFact::new(Cents::from(2000), &reference)).await.unwrap();
    assert_eq!(done.transaction().status, TransactionStatus::Fulfilled);
    let reservation = h.db.fetch_reservation("table-7").await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Accepted);
}

#[tokio::test]
async fn unconfirmed_refunds_are_requested_by_the_sweep() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_reservation(&h.db, "table-9", "venue", "erin", 2500).await;
    let tx = h.checkout.checkout_reservation("table-9", "erin").await.unwrap().transaction().clone();
    let reference = tx.external_reference.clone().unwrap();
    let fact = VerifiedPaymentFact::new(Cents::from(2400), &reference);
    assert!(h.completion.complete(&tx.id, fact).await.unwrap_err().is_integrity_failure());

    // Nothing listens for the cancellation event here, as if the process died before the refund went out
    let cancelled = h.admin.resolve_flagged(&tx.id, Resolution::Cancel { refund: true }).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert!(cancelled.refund_requested_at.is_some());
    assert!(h.processor.refunds().is_empty());

    let summary = h.sweeper.run_sweep(Utc::now() + Duration::seconds(1)).await;
    assert_eq!(summary.refunded, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(h.processor.refunds(), vec![(reference, Cents::from(2500))]);
    let effects = h.db.effects_for_transaction(&tx.id).await.unwrap();
    assert_eq!(effects.iter().filter(|e| e.effect == EffectType::Refund).count(), 1);

    let summary = h.sweeper.run_sweep(Utc::now() + Duration::seconds(2)).await;
    assert_eq!(summary.refunded, 0);
    assert_eq!(h.processor.refunds().len(), 1);
}

#[tokio::test]
async fn reference_mismatch_flags() {
    let h = Harness::new().await.with_business("cafe", PlanTier::Basic).await;
    seed_offer(&h.db, "scone", "cafe", 400, 0, None).await;
    let tx = h.checkout.checkout_offer_purchase("scone", "erin").await.unwrap().transaction().clone();
    let result = h.completion.complete(&tx.id, VerifiedPaymentFact::new(Cents::from(400), "cs_someone_else")).await;
    assert!(matches!(result, Err(CompletionError::ReferenceMismatch { .. })));
    let tx = h.db.fetch_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Flagged);

    let cancelled = h.admin.resolve_flagged(&tx.id, Resolution::Cancel { refund: false }).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert!(cancelled.refund_requested_at.is_none());
    let purchase = h.db.fetch_offer_purchase(&tx.id).await.unwrap().unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Cancelled);
}

#[tokio::test]
async fn expired_sessions_release_their_holds() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_reservation(&h.db, "table-2", "venue", "frank", 1500).await;
    let tx = h.checkout.checkout_reservation("table-2", "frank").await.unwrap().transaction().clone();
    h.processor.expire(tx.external_reference.as_deref().unwrap());

    let summary = h.sweeper.run_sweep(Utc::now() + Duration::seconds(1)).await;
    assert_eq!(summary.expired, 1);
    let tx = h.db.fetch_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Expired);
    let reservation = h.db.fetch_reservation("table-2").await.unwrap().unwrap();
    assert_eq!(reservation.status, ReservationStatus::Requested);

    // A payment that turns up afterwards never revives it
    let late = h.completion.complete(&tx.id, VerifiedPaymentFact::new(Cents::from(1500), "cs_late")).await.unwrap();
    assert_eq!(late.transaction().status, TransactionStatus::Expired);
    assert!(h.db.settlements_for_business("venue").await.unwrap().is_empty());
}

#[tokio::test]
async fn unpaid_sessions_are_closed_once_abandoned() {
    let h = Harness::new().await.with_business("cafe", PlanTier::Basic).await;
    seed_offer(&h.db, "bagel", "cafe", 300, 0, Some(1)).await;
    let tx = h.checkout.checkout_offer_purchase("bagel", "gina").await.unwrap().transaction().clone();
    let reference = tx.external_reference.clone().unwrap();

    // The pending purchase holds the only unit
    let sold_out = h.checkout.checkout_offer_purchase("bagel", "hank").await;
    assert!(matches!(sold_out, Err(CheckoutError::Validation(ValidationError::SoldOut(_)))));

    let summary = h.sweeper.run_sweep(Utc::now() + Duration::seconds(1)).await;
    assert_eq!(summary.still_open, 1);
    assert_eq!(summary.expired, 0);

    // Past the ceiling, a session the processor still reports open counts as unpaid
    let summary = h.sweeper.run_sweep(Utc::now() + Duration::hours(25)).await;
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.still_open, 0);
    assert_eq!(h.processor.session(&reference).unwrap().status.state, SessionState::Expired);
    let tx = h.db.fetch_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Expired);
    let purchase = h.db.fetch_offer_purchase(&tx.id).await.unwrap().unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Expired);
    assert!(h.checkout.checkout_offer_purchase("bagel", "hank").await.is_ok());
}

#[tokio::test]
async fn abandoned_session_paid_at_the_last_moment_completes() {
    let h = Harness::new().await.with_business("cafe", PlanTier::Basic).await;
    seed_offer(&h.db, "bagel", "cafe", 300, 0, Some(1)).await;
    let tx = h.checkout.checkout_offer_purchase("bagel", "gina").await.unwrap().transaction().clone();
    h.processor.pay(tx.external_reference.as_deref().unwrap());

    let summary = h.sweeper.run_sweep(Utc::now() + Duration::hours(25)).await;
    assert_eq!(summary.reconciled, 1);
    assert_eq!(summary.expired, 0);
    let tx = h.db.fetch_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Fulfilled);
}

#[tokio::test]
async fn failed_session_leaves_transaction_pending() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_event(&h.db, "gig", "venue").await;
    seed_ticket_tier(&h.db, "pit", "gig", "venue", 1000, 10).await;
    h.processor.fail_next_session();

    let err = h.checkout.checkout_ticket_order("pit", "ivan", 1).await.unwrap_err();
    let CheckoutError::Funding(FundingError::SessionUnavailable { id, .. }) = err else {
        panic!("Expected SessionUnavailable, got {err:?}");
    };
    let tx = h.db.fetch_transaction(&id).await.unwrap().unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert!(tx.external_reference.is_none());

    let retried = h.checkout.retry_session(&id).await.expect("Retry failed");
    assert_eq!(retried.transaction().status, TransactionStatus::AwaitingExternalPayment);
    assert!(matches!(
        h.checkout.retry_session(&id).await,
        Err(CheckoutError::Validation(ValidationError::NotRetryable { .. }))
    ));
}

#[tokio::test]
async fn checkout_validation() {
    let h = Harness::new().await.with_business("venue", PlanTier::Basic).await;
    seed_event(&h.db, "gig", "venue").await;
    seed_ticket_tier(&h.db, "vip", "gig", "venue", 5000, 2).await;
    seed_reservation(&h.db, "table-1", "venue", "judy", 1000).await;

    let too_many = h.checkout.checkout_ticket_order("vip", "kim", 3).await;
    assert!(matches!(too_many, Err(CheckoutError::Validation(ValidationError::SoldOut(_)))));
    let zero = h.checkout.checkout_ticket_order("vip", "kim", 0).await;
    assert!(matches!(zero, Err(CheckoutError::Validation(ValidationError::InvalidQuantity(0)))));
    let missing = h.checkout.checkout_ticket_order("nope", "kim", 1).await;
    assert!(matches!(missing, Err(CheckoutError::Validation(ValidationError::SubjectNotFound(_)))));
    let wrong_payer = h.checkout.checkout_reservation("table-1", "kim").await;
    assert!(matches!(wrong_payer, Err(CheckoutError::Validation(ValidationError::WrongPayer(_)))));
    let past = Utc::now() - Duration::days(10);
    let stale = h
        .checkout
        .checkout_boost(TransactionKind::EventBoost, "venue", "gig", past, 2, FundingPreference::External)
        .await;
    assert!(matches!(stale, Err(CheckoutError::Validation(ValidationError::InvalidWindow(_)))));
    let not_boost = h
        .checkout
        .checkout_boost(TransactionKind::TicketOrder, "venue", "gig", Utc::now(), 2, FundingPreference::External)
        .await;
    assert!(matches!(not_boost, Err(CheckoutError::Validation(ValidationError::NotABoost(_)))));
    assert!(h.db.search_transactions(TransactionQueryFilter::default()).await.unwrap().is_empty());
}
