//! `SqliteDatabase` is a concrete implementation of an activation engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every multi-statement operation runs in a single SQLite transaction that opens with its guarding write.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{catalog, db_url, effects, is_unique_violation, ledgers, new_pool, settlements, transactions, webhooks};
use crate::{
    db_types::{
        BudgetLedgerEntry,
        Business,
        Cents,
        EffectRecord,
        EffectType,
        Event,
        FundingMode,
        NewTransaction,
        Offer,
        OfferPurchase,
        PlanTier,
        PurchaseStatus,
        Reservation,
        SettlementEntry,
        Ticket,
        TicketTier,
        Transaction,
        TransactionId,
        TransactionKind,
        TransactionStatus,
    },
    helpers::new_redemption_token,
    traits::{
        ActivationResult,
        BudgetLedger,
        BudgetReservation,
        CatalogManagement,
        CompletionPlan,
        FreeOfferClaim,
        ResetOutcome,
        StoreCompletion,
        StoreError,
        SweepWindow,
        TransactionQueryFilter,
        TransactionStore,
        UnavailableReason,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl TransactionStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_transaction(&self, new_tx: NewTransaction) -> Result<Transaction, StoreError> {
        let mut db_tx = self.pool.begin().await?;
        let tx = transactions::insert(new_tx, &mut db_tx).await?;
        match tx.kind {
            TransactionKind::Reservation => {
                if !catalog::hold_reservation(&tx.subject_id, &mut db_tx).await? {
                    db_tx.rollback().await?;
                    return Err(StoreError::SubjectUnavailable(format!("Reservation {}", tx.subject_id)));
                }
            },
            TransactionKind::OfferPurchase => {
                catalog::insert_offer_purchase(&tx.id, &tx.subject_id, &tx.payer_ref, tx.created_at, &mut db_tx)
                    .await?;
            },
            _ => {},
        }
        db_tx.commit().await?;
        debug!("🗃️ {} [{}] created for {} ({})", tx.kind, tx.id, tx.payer_ref, tx.amount_gross_cents);
        Ok(tx)
    }

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch(id, &mut conn).await?;
        Ok(tx)
    }

    async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::search(query, &mut conn).await?;
        Ok(result)
    }

    async fn attach_external_reference(
        &self,
        id: &TransactionId,
        reference: &str,
    ) -> Result<Transaction, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let updated = match transactions::attach_reference(id, reference, Utc::now(), &mut conn).await {
            Ok(updated) => updated,
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::ReferenceConflict { id: id.clone(), existing: reference.to_string() })
            },
            Err(e) => return Err(e.into()),
        };
        if let Some(tx) = updated {
            debug!("🗃️ [{id}] is awaiting payment on session {reference}");
            return Ok(tx);
        }
        let tx = transactions::fetch(id, &mut conn).await?.ok_or_else(|| StoreError::TransactionNotFound(id.clone()))?;
        match tx.external_reference.as_deref() {
            Some(existing) if existing == reference => Ok(tx),
            Some(existing) => Err(StoreError::ReferenceConflict { id: id.clone(), existing: existing.to_string() }),
            None => Err(StoreError::InvalidTransition {
                id: id.clone(),
                from: tx.status,
                to: TransactionStatus::AwaitingExternalPayment,
            }),
        }
    }

    /// In one database transaction:
    /// * marks the budget share as deducted (the guarding write),
    /// * decrements the payer's ledger, failing closed,
    /// * records the `budget_deduction` fingerprint.
    async fn reserve_budget_for_transaction(&self, id: &TransactionId) -> Result<BudgetReservation, StoreError> {
        let now = Utc::now();
        let mut db_tx = self.pool.begin().await?;
        let marked = transactions::mark_budget_deducted(id, &[TransactionStatus::Pending], now, &mut db_tx).await?;
        let tx = match marked {
            Some(tx) if tx.funding_mode == FundingMode::InternalBudget => tx,
            Some(_) => {
                db_tx.rollback().await?;
                return Err(StoreError::BudgetNotApplicable(id.clone()));
            },
            None => {
                db_tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                return match transactions::fetch(id, &mut conn).await? {
                    None => Err(StoreError::TransactionNotFound(id.clone())),
                    Some(tx) if tx.budget_deducted => Ok(BudgetReservation::AlreadyReserved(tx)),
                    Some(_) => Err(StoreError::BudgetNotApplicable(id.clone())),
                };
            },
        };
        // Boosts are bought by the business whose ledger funds them.
        if !ledgers::try_decrement(&tx.payer_ref, tx.partial_budget_cents, now, &mut db_tx).await? {
            db_tx.rollback().await?;
            info!("💰️ Budget of {} cannot fund [{id}] ({})", tx.payer_ref, tx.partial_budget_cents);
            return Ok(BudgetReservation::Insufficient);
        }
        if !effects::record_effect(id, EffectType::BudgetDeduction, now, &mut db_tx).await? {
            db_tx.rollback().await?;
            warn!("💰️ [{id}] already had a budget deduction on record. Nothing was deducted.");
            return Ok(BudgetReservation::AlreadyReserved(tx));
        }
        db_tx.commit().await?;
        info!("💰️ {} deducted from the budget of {} for [{id}]", tx.partial_budget_cents, tx.payer_ref);
        Ok(BudgetReservation::Reserved(tx))
    }

    async fn apply_completion(&self, id: &TransactionId, plan: CompletionPlan) -> Result<StoreCompletion, StoreError> {
        let now = plan.now;
        let mut db_tx = self.pool.begin().await?;
        let swapped = transactions::complete(id, plan.external_reference.as_deref(), now, &mut db_tx).await?;
        let Some(mut tx) = swapped else {
            db_tx.rollback().await?;
            return self.lost_completion_race(id).await;
        };
        if !effects::record_effect(id, EffectType::Fulfilment, now, &mut db_tx).await? {
            db_tx.rollback().await?;
            warn!("🗃️ [{id}] was open but its fulfilment was already on record. Nothing was applied.");
            return self.lost_completion_race(id).await;
        }
        if let Err(reason) = apply_kind_effect(&mut tx, now, &mut db_tx).await? {
            db_tx.rollback().await?;
            info!("🗃️ [{id}] could not be completed. {reason}");
            return Ok(StoreCompletion::Unavailable(reason));
        }
        if !tx.kind.is_boost() {
            settlements::insert_settlement(&tx, now, &mut db_tx).await?;
        }
        db_tx.commit().await?;
        debug!("🗃️ [{id}] completed. Status is now {}", tx.status);
        Ok(StoreCompletion::Applied(tx))
    }

    async fn flag_transaction(&self, id: &TransactionId, reason: &str) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::transition(
            id,
            TransactionStatus::open_statuses(),
            TransactionStatus::Flagged,
            Some(reason),
            Utc::now(),
            &mut conn,
        )
        .await?;
        if result.is_some() {
            warn!("🗃️ [{id}] has been flagged for review. {reason}");
        }
        Ok(result)
    }

    async fn expire_transaction(&self, id: &TransactionId, reason: &str) -> Result<Option<Transaction>, StoreError> {
        let now = Utc::now();
        let mut db_tx = self.pool.begin().await?;
        let Some(tx) = transactions::expire(id, reason, now, &mut db_tx).await? else {
            db_tx.rollback().await?;
            return Ok(None);
        };
        release_hold(&tx, PurchaseStatus::Expired, &mut db_tx).await?;
        effects::record_effect(id, EffectType::Release, now, &mut db_tx).await?;
        db_tx.commit().await?;
        debug!("🗃️ [{id}] expired. {reason}");
        Ok(Some(tx))
    }

    async fn cancel_transaction(
        &self,
        id: &TransactionId,
        reason: &str,
        refund: bool,
    ) -> Result<Option<Transaction>, StoreError> {
        let now = Utc::now();
        let mut db_tx = self.pool.begin().await?;
        let Some(tx) = transactions::cancel(id, reason, refund, now, &mut db_tx).await? else {
            db_tx.rollback().await?;
            return Ok(None);
        };
        release_hold(&tx, PurchaseStatus::Cancelled, &mut db_tx).await?;
        effects::record_effect(id, EffectType::Cancellation, now, &mut db_tx).await?;
        db_tx.commit().await?;
        debug!("🗃️ [{id}] cancelled (refund requested: {refund}). {reason}");
        Ok(Some(tx))
    }

    async fn unconfirmed_refunds(&self, requested_before: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::unconfirmed_refunds(requested_before, &mut conn).await?;
        Ok(result)
    }

    async fn confirm_refund(&self, id: &TransactionId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let recorded = effects::record_effect(id, EffectType::Refund, Utc::now(), &mut conn).await?;
        Ok(recorded)
    }

    async fn reopen_flagged(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::reopen_flagged(id, Utc::now(), &mut conn).await?;
        Ok(result)
    }

    async fn reconciliation_candidates(&self, window: SweepWindow) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::reconciliation_candidates(window, &mut conn).await?;
        Ok(result)
    }

    async fn abandoned_transactions(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::abandoned(now, max_age, &mut conn).await?;
        Ok(result)
    }

    async fn due_boosts(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::due_boosts(now, &mut conn).await?;
        Ok(result)
    }

    async fn activate_boost(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<ActivationResult, StoreError> {
        let mut db_tx = self.pool.begin().await?;
        let Some(mut tx) = transactions::activate(id, now, &mut db_tx).await? else {
            db_tx.rollback().await?;
            return Ok(ActivationResult::NotDue);
        };
        if needs_deferred_deduction(&tx) {
            if !ledgers::try_decrement(&tx.payer_ref, tx.partial_budget_cents, now, &mut db_tx).await? {
                db_tx.rollback().await?;
                let reason = format!("Budget of {} cannot cover {}", tx.payer_ref, tx.partial_budget_cents);
                return Ok(ActivationResult::Deferred(reason));
            }
            tx = deduct_boost_share(&tx, now, &mut db_tx).await?;
        }
        db_tx.commit().await?;
        Ok(ActivationResult::Activated(tx))
    }

    async fn end_boost(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::end(id, now, &mut conn).await?;
        Ok(result)
    }

    async fn effects_for_transaction(&self, id: &TransactionId) -> Result<Vec<EffectRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = effects::effects_for(id, &mut conn).await?;
        Ok(result)
    }

    async fn settlements_for_business(&self, business_id: &str) -> Result<Vec<SettlementEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = settlements::settlements_for_business(business_id, &mut conn).await?;
        Ok(result)
    }

    async fn webhook_event_seen(&self, event_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let seen = webhooks::event_seen(event_id, &mut conn).await?;
        Ok(seen)
    }

    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let fresh = webhooks::record_event(event_id, event_type, Utc::now(), &mut conn).await?;
        Ok(fresh)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Applies the kind-specific completion effect inside the completion transaction. `Ok(Err(..))` means the effect could
/// not be applied and the caller must roll back.
async fn apply_kind_effect(
    tx: &mut Transaction,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Result<(), UnavailableReason>, StoreError> {
    match tx.kind {
        TransactionKind::TicketOrder => {
            if !catalog::increment_tier_sold(&tx.subject_id, tx.quantity, conn).await? {
                let reason = format!("Ticket tier {} cannot supply {} more tickets", tx.subject_id, tx.quantity);
                return Ok(Err(UnavailableReason::InventoryExhausted(reason)));
            }
            catalog::insert_tickets(&tx.id, &tx.subject_id, &tx.payer_ref, tx.quantity, now, conn).await?;
        },
        TransactionKind::Reservation => {
            if !catalog::accept_reservation(&tx.subject_id, conn).await? {
                let reason = format!("Reservation {} is no longer awaiting payment", tx.subject_id);
                return Ok(Err(UnavailableReason::SubjectUnavailable(reason)));
            }
        },
        TransactionKind::OfferPurchase => {
            if !catalog::increment_offer_sold(&tx.subject_id, conn).await? {
                let reason = format!("Offer {} is out of stock", tx.subject_id);
                return Ok(Err(UnavailableReason::InventoryExhausted(reason)));
            }
            let token = new_redemption_token();
            if catalog::mark_purchase_paid(&tx.id, &token, conn).await?.is_none() {
                let reason = format!("The purchase of offer {} is no longer pending", tx.subject_id);
                return Ok(Err(UnavailableReason::SubjectUnavailable(reason)));
            }
        },
        TransactionKind::ProfileBoost | TransactionKind::EventBoost | TransactionKind::OfferBoost => {
            if tx.status == TransactionStatus::Active && needs_deferred_deduction(tx) {
                if ledgers::try_decrement(&tx.payer_ref, tx.partial_budget_cents, now, conn).await? {
                    *tx = deduct_boost_share(tx, now, conn).await?;
                } else {
                    // Paid for, but not yet covered by the budget. The scheduler retries.
                    let reason = "Budget share deferred until the ledger can cover it";
                    *tx = transactions::transition(
                        &tx.id,
                        &[TransactionStatus::Active],
                        TransactionStatus::Scheduled,
                        Some(reason),
                        now,
                        conn,
                    )
                    .await?
                    .ok_or_else(|| StoreError::DatabaseError(format!("Boost [{}] vanished mid-completion", tx.id)))?;
                    info!("⏰️ [{}] is paid but stays scheduled. {reason}", tx.id);
                }
            }
        },
    }
    Ok(Ok(()))
}

fn needs_deferred_deduction(tx: &Transaction) -> bool {
    tx.funding_mode == FundingMode::Mixed && !tx.budget_deducted && tx.partial_budget_cents > Cents::zero()
}

/// Records a mixed boost's budget share as taken. The ledger must already have been decremented in this transaction.
async fn deduct_boost_share(
    tx: &Transaction,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Transaction, StoreError> {
    let updated = transactions::mark_budget_deducted(&tx.id, &[TransactionStatus::Active], now, conn)
        .await?
        .ok_or_else(|| StoreError::BudgetNotApplicable(tx.id.clone()))?;
    effects::record_effect(&tx.id, EffectType::BudgetDeduction, now, conn).await?;
    info!("💰️ {} deducted from the budget of {} for boost [{}]", tx.partial_budget_cents, tx.payer_ref, tx.id);
    Ok(updated)
}

/// Gives back whatever the transaction held on its subject.
async fn release_hold(
    tx: &Transaction,
    purchase_status: PurchaseStatus,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    match tx.kind {
        TransactionKind::Reservation => {
            catalog::release_reservation(&tx.subject_id, conn).await?;
        },
        TransactionKind::OfferPurchase => {
            catalog::close_pending_purchase(&tx.id, purchase_status, conn).await?;
        },
        _ => {},
    }
    Ok(())
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed. {e}")))?;
        Ok(())
    }

    /// Works out why a completion compare-and-swap matched nothing.
    async fn lost_completion_race(&self, id: &TransactionId) -> Result<StoreCompletion, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch(id, &mut conn).await?.ok_or_else(|| StoreError::TransactionNotFound(id.clone()))?;
        if tx.status.is_terminal() {
            Ok(StoreCompletion::AlreadyApplied(tx))
        } else {
            Err(StoreError::InvalidTransition { id: id.clone(), from: tx.status, to: TransactionStatus::Fulfilled })
        }
    }
}

impl BudgetLedger for SqliteDatabase {
    async fn fetch_ledger(&self, business_id: &str) -> Result<Option<BudgetLedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let entry = ledgers::fetch_ledger(business_id, &mut conn).await?;
        Ok(entry)
    }

    async fn reserve(&self, business_id: &str, amount: Cents) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ok = ledgers::try_decrement(business_id, amount, Utc::now(), &mut conn).await?;
        Ok(ok)
    }

    async fn reset(
        &self,
        business_id: &str,
        budget: Cents,
        commission_free_offers: i64,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<ResetOutcome, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let reset = ledgers::reset_ledger(
            business_id,
            budget,
            commission_free_offers,
            period_start,
            period_end,
            Utc::now(),
            &mut conn,
        )
        .await?;
        match reset {
            Some(entry) => Ok(ResetOutcome::Reset(entry)),
            None => {
                let entry = ledgers::fetch_ledger(business_id, &mut conn)
                    .await?
                    .ok_or_else(|| StoreError::LedgerNotFound(business_id.to_string()))?;
                debug!("💰️ Ledger for {business_id} is already on the period starting {}", entry.period_start);
                Ok(ResetOutcome::Unchanged(entry))
            },
        }
    }

    async fn renew(
        &self,
        business_id: &str,
        plan: PlanTier,
        budget: Cents,
        commission_free_offers: i64,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<ResetOutcome, StoreError> {
        let mut db_tx = self.pool.begin().await?;
        let reset = ledgers::reset_ledger(
            business_id,
            budget,
            commission_free_offers,
            period_start,
            period_end,
            Utc::now(),
            &mut db_tx,
        )
        .await?;
        let Some(entry) = reset else {
            let entry = ledgers::fetch_ledger(business_id, &mut db_tx)
                .await?
                .ok_or_else(|| StoreError::LedgerNotFound(business_id.to_string()))?;
            db_tx.rollback().await?;
            debug!("💰️ Renewal for {business_id} is not newer than the period starting {}", entry.period_start);
            return Ok(ResetOutcome::Unchanged(entry));
        };
        if !catalog::set_plan_tier(business_id, plan, &mut db_tx).await? {
            db_tx.rollback().await?;
            return Err(StoreError::SubjectNotFound(format!("business {business_id}")));
        }
        db_tx.commit().await?;
        Ok(ResetOutcome::Reset(entry))
    }

    async fn claim_commission_free_offer(
        &self,
        business_id: &str,
        offer_id: &str,
    ) -> Result<FreeOfferClaim, StoreError> {
        let now = Utc::now();
        let mut db_tx = self.pool.begin().await?;
        if !catalog::mark_offer_commission_free(offer_id, business_id, &mut db_tx).await? {
            let offer = catalog::fetch_offer(offer_id, &mut db_tx).await?;
            db_tx.rollback().await?;
            return match offer {
                Some(o) if o.business_id == business_id => Ok(FreeOfferClaim::AlreadyCommissionFree),
                _ => Err(StoreError::SubjectNotFound(format!("offer {offer_id} of business {business_id}"))),
            };
        }
        let Some(entry) = ledgers::take_free_offer_credit(business_id, now, &mut db_tx).await? else {
            db_tx.rollback().await?;
            return Ok(FreeOfferClaim::Exhausted);
        };
        db_tx.commit().await?;
        info!(
            "💰️ Offer {offer_id} is now commission-free. {business_id} has {} credits left",
            entry.commission_free_offers_remaining
        );
        Ok(FreeOfferClaim::Claimed(entry))
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_business(&self, id: &str) -> Result<Option<Business>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_business(id, &mut conn).await?)
    }

    async fn fetch_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_event(id, &mut conn).await?)
    }

    async fn fetch_ticket_tier(&self, id: &str) -> Result<Option<TicketTier>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_ticket_tier(id, &mut conn).await?)
    }

    async fn fetch_reservation(&self, id: &str) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_reservation(id, &mut conn).await?)
    }

    async fn fetch_offer(&self, id: &str) -> Result<Option<Offer>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_offer(id, &mut conn).await?)
    }

    async fn fetch_offer_purchase(&self, transaction_id: &TransactionId) -> Result<Option<OfferPurchase>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_offer_purchase(transaction_id, &mut conn).await?)
    }

    async fn fetch_tickets(&self, transaction_id: &TransactionId) -> Result<Vec<Ticket>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_tickets(transaction_id, &mut conn).await?)
    }

    async fn tickets_committed_to_payer(&self, tier_id: &str, payer: &str) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::tickets_committed_to_payer(tier_id, payer, &mut conn).await?)
    }

    async fn offer_purchases_by_payer(&self, offer_id: &str, payer: &str) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::offer_purchases_by_payer(offer_id, payer, &mut conn).await?)
    }

    async fn pending_offer_purchases(&self, offer_id: &str) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::pending_offer_purchases(offer_id, &mut conn).await?)
    }

    async fn upsert_business(&self, business: Business) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::upsert_business(business, &mut conn).await?)
    }

    async fn upsert_event(&self, event: Event) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::upsert_event(event, &mut conn).await?)
    }

    async fn upsert_ticket_tier(&self, tier: TicketTier) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::upsert_ticket_tier(tier, &mut conn).await?)
    }

    async fn upsert_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::upsert_reservation(reservation, &mut conn).await?)
    }

    async fn upsert_offer(&self, offer: Offer) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::upsert_offer(offer, &mut conn).await?)
    }
}
