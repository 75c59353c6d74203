use chrono::{DateTime, Utc};

use crate::{
    db_types::{BudgetLedgerEntry, Cents, PlanTier},
    traits::{
        data_objects::{FreeOfferClaim, ResetOutcome},
        StoreError,
    },
};

/// A business's monthly promotion budget and commission-free-offer allowance.
///
/// All mutations are single conditional updates on the business's ledger row, so concurrent callers for the same
/// business are serialized by the datastore and the remaining budget can never go negative.
#[allow(async_fn_in_trait)]
pub trait BudgetLedger: Clone {
    async fn fetch_ledger(&self, business_id: &str) -> Result<Option<BudgetLedgerEntry>, StoreError>;

    /// Atomic check-and-decrement. Returns `false`, and changes nothing, if less than `amount` remains.
    async fn reserve(&self, business_id: &str, amount: Cents) -> Result<bool, StoreError>;

    /// Starts a new billing period. A reset for the period that is already current is a no-op, so renewal
    /// notifications may safely be replayed.
    async fn reset(
        &self,
        business_id: &str,
        budget: Cents,
        commission_free_offers: i64,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<ResetOutcome, StoreError>;

    /// A [`reset`](Self::reset) that also records the business's new plan tier. The tier is written in the same
    /// datastore transaction, and only when the period actually moves forward, so a stale renewal leaves both the
    /// ledger and the plan alone.
    #[allow(clippy::too_many_arguments)]
    async fn renew(
        &self,
        business_id: &str,
        plan: PlanTier,
        budget: Cents,
        commission_free_offers: i64,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<ResetOutcome, StoreError>;

    /// Spends one commission-free-offer credit on the given offer.
    async fn claim_commission_free_offer(&self, business_id: &str, offer_id: &str)
        -> Result<FreeOfferClaim, StoreError>;
}
