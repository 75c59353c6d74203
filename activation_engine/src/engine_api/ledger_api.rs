use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{BudgetLedgerEntry, Cents, PlanTier},
    engine_api::{engine_objects::PlanAllowances, errors::LedgerError},
    traits::{FreeOfferClaim, ResetOutcome, StoreError, TransactionStore},
};

/// `LedgerApi` manages each business's monthly promotion budget and commission-free-offer allowance.
pub struct LedgerApi<B> {
    db: B,
    allowances: PlanAllowances,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.allowances)
    }
}

impl<B: Clone> Clone for LedgerApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), allowances: self.allowances.clone() }
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, allowances: PlanAllowances::default() }
    }

    pub fn with_allowances(mut self, allowances: PlanAllowances) -> Self {
        self.allowances = allowances;
        self
    }

    pub fn allowances(&self) -> &PlanAllowances {
        &self.allowances
    }
}

impl<B> LedgerApi<B>
where B: TransactionStore
{
    pub async fn ledger(&self, business_id: &str) -> Result<Option<BudgetLedgerEntry>, LedgerError> {
        Ok(self.db.fetch_ledger(business_id).await?)
    }

    /// Atomically takes `amount` from the business's budget. Returns `false` without changing anything if the budget
    /// cannot cover it.
    pub async fn reserve(&self, business_id: &str, amount: Cents) -> Result<bool, LedgerError> {
        if amount.value() <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let reserved = self.db.reserve(business_id, amount).await?;
        if reserved {
            debug!("💰️ Reserved {amount} from the budget of {business_id}");
        } else {
            debug!("💰️ The budget of {business_id} cannot cover {amount}");
        }
        Ok(reserved)
    }

    /// Starts a new billing period with the given allowance. Replaying a reset for the current period changes nothing.
    pub async fn reset(
        &self,
        business_id: &str,
        budget: Cents,
        commission_free_offers: i64,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<ResetOutcome, LedgerError> {
        if budget.is_negative() {
            return Err(LedgerError::InvalidAmount(budget));
        }
        if commission_free_offers < 0 {
            return Err(LedgerError::InvalidAmount(Cents::from(commission_free_offers)));
        }
        if period_end <= period_start {
            return Err(LedgerError::InvalidPeriod);
        }
        if self.db.fetch_business(business_id).await?.is_none() {
            return Err(LedgerError::BusinessNotFound(business_id.to_string()));
        }
        let outcome = self
            .db
            .reset(business_id, budget, commission_free_offers, period_start, period_end)
            .await
            .map_err(|e| match e {
                StoreError::LedgerNotFound(id) | StoreError::SubjectNotFound(id) => LedgerError::BusinessNotFound(id),
                e => LedgerError::Store(e),
            })?;
        match &outcome {
            ResetOutcome::Reset(entry) => info!(
                "💰️ Budget of {business_id} reset to {} with {} commission-free offers for the period starting {}",
                entry.monthly_budget_remaining_cents, entry.commission_free_offers_remaining, entry.period_start
            ),
            ResetOutcome::Unchanged(entry) => {
                debug!("💰️ Budget of {business_id} is already on the period starting {}", entry.period_start)
            },
        }
        Ok(outcome)
    }

    /// Applies a subscription renewal: resets the ledger to the plan's allowance and records the plan tier. A renewal
    /// for a period that is not newer than the current one changes neither.
    pub async fn renew(
        &self,
        business_id: &str,
        plan: PlanTier,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<ResetOutcome, LedgerError> {
        if period_end <= period_start {
            return Err(LedgerError::InvalidPeriod);
        }
        if self.db.fetch_business(business_id).await?.is_none() {
            return Err(LedgerError::BusinessNotFound(business_id.to_string()));
        }
        let allowance = self.allowances.for_plan(plan);
        let outcome = self
            .db
            .renew(business_id, plan, allowance.budget, allowance.commission_free_offers, period_start, period_end)
            .await
            .map_err(|e| match e {
                StoreError::LedgerNotFound(id) | StoreError::SubjectNotFound(id) => LedgerError::BusinessNotFound(id),
                e => LedgerError::Store(e),
            })?;
        match &outcome {
            ResetOutcome::Reset(entry) => info!(
                "💰️ {business_id} renewed on the {plan} plan. Budget is {} for the period starting {}",
                entry.monthly_budget_remaining_cents, entry.period_start
            ),
            ResetOutcome::Unchanged(entry) => warn!(
                "💰️ Ignoring a {plan} renewal for {business_id} starting {period_start}. The ledger is already on the \
                 period starting {}",
                entry.period_start
            ),
        }
        Ok(outcome)
    }

    /// Marks an offer commission-free, spending one of the business's credits.
    pub async fn claim_commission_free_offer(
        &self,
        business_id: &str,
        offer_id: &str,
    ) -> Result<FreeOfferClaim, LedgerError> {
        let claim = self.db.claim_commission_free_offer(business_id, offer_id).await?;
        match &claim {
            FreeOfferClaim::Claimed(entry) => info!(
                "💰️ Offer {offer_id} is now commission-free. {business_id} has {} credits left",
                entry.commission_free_offers_remaining
            ),
            FreeOfferClaim::AlreadyCommissionFree => debug!("💰️ Offer {offer_id} was already commission-free"),
            FreeOfferClaim::Exhausted => debug!("💰️ {business_id} has no commission-free offer credits left"),
        }
        Ok(claim)
    }
}
