use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{EffectRecord, NewTransaction, SettlementEntry, Transaction, TransactionId, TransactionStatus},
    traits::{
        data_objects::{
            ActivationResult,
            BudgetReservation,
            CompletionPlan,
            StoreCompletion,
            SweepWindow,
            TransactionQueryFilter,
        },
        BudgetLedger,
        CatalogManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the activation engine.
///
/// Every method that changes a transaction's status is a conditional update guarded by the current status. Methods
/// returning `Option<Transaction>` return `None` when the guard did not match, i.e. when another caller got there
/// first. That is how races between the webhook, the sweeper and the checkout path are resolved: the loser sees `None`
/// and applies no effects.
///
/// Side effects belonging to a transition are applied in the same database transaction as the status change, so a
/// reader never observes one without the other.
#[allow(async_fn_in_trait)]
pub trait TransactionStore: Clone + CatalogManagement + BudgetLedger {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new transaction in `pending` status, and places any checkout-time hold on its subject:
    /// * reservations move from `requested` to `payment_pending`,
    /// * offer purchases get a `pending` purchase row.
    ///
    /// Ticket capacity is only validated at checkout, never held.
    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction, StoreError>;

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError>;

    async fn search_transactions(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, StoreError>;

    /// `pending → awaiting_external_payment`, recording the processor's session reference.
    ///
    /// Allowed once. If a reference is already attached, the existing record is returned unchanged when it matches,
    /// and an error is returned when it differs.
    async fn attach_external_reference(&self, id: &TransactionId, reference: &str)
        -> Result<Transaction, StoreError>;

    /// Deducts the full budget share of an `internal_budget` transaction from the business ledger and marks the
    /// transaction as budget-deducted, atomically and at most once.
    async fn reserve_budget_for_transaction(&self, id: &TransactionId) -> Result<BudgetReservation, StoreError>;

    /// The single completion path. In one atomic unit:
    /// * moves the transaction from an open status to `fulfilled` (or `scheduled`/`active` for boosts),
    /// * records the fulfilment fingerprint,
    /// * applies the kind-specific effect (tickets, reservation acceptance, offer redemption token or boost budget
    ///   share),
    /// * writes the settlement journal entry.
    ///
    /// If the kind-specific effect cannot be applied (sold out, reservation gone) nothing is written and
    /// [`StoreCompletion::Unavailable`] is returned.
    async fn apply_completion(&self, id: &TransactionId, plan: CompletionPlan) -> Result<StoreCompletion, StoreError>;

    /// Fences an open transaction into `flagged` for operator review.
    async fn flag_transaction(&self, id: &TransactionId, reason: &str) -> Result<Option<Transaction>, StoreError>;

    /// Moves an open, unfunded transaction to `expired` and releases whatever it held.
    async fn expire_transaction(&self, id: &TransactionId, reason: &str) -> Result<Option<Transaction>, StoreError>;

    /// Moves a non-terminal transaction to `cancelled`. If `refund` is true, the refund request time is recorded.
    async fn cancel_transaction(
        &self,
        id: &TransactionId,
        reason: &str,
        refund: bool,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Cancelled transactions with a refund requested before `requested_before` that the processor has not yet
    /// confirmed.
    async fn unconfirmed_refunds(&self, requested_before: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError>;

    /// Records that the processor accepted the refund for a cancelled transaction. Returns false if it was already
    /// recorded.
    async fn confirm_refund(&self, id: &TransactionId) -> Result<bool, StoreError>;

    /// Lifts the integrity fence on a flagged transaction, returning it to the open status it came from.
    async fn reopen_flagged(&self, id: &TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Open transactions created inside the sweep window (`pending` or `awaiting_external_payment`, never `flagged`).
    async fn reconciliation_candidates(&self, window: SweepWindow) -> Result<Vec<Transaction>, StoreError>;

    /// Open transactions whose `expires_at` has passed, or that are older than `max_age`.
    async fn abandoned_transactions(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Scheduled boosts whose start time has passed, and active boosts whose end time has passed.
    async fn due_boosts(&self, now: DateTime<Utc>) -> Result<Vec<Transaction>, StoreError>;

    /// `scheduled → active`, deducting a deferred mixed-funding budget share in the same atomic unit.
    async fn activate_boost(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<ActivationResult, StoreError>;

    /// `active → ended`.
    async fn end_boost(&self, id: &TransactionId, now: DateTime<Utc>) -> Result<Option<Transaction>, StoreError>;

    async fn effects_for_transaction(&self, id: &TransactionId) -> Result<Vec<EffectRecord>, StoreError>;

    async fn settlements_for_business(&self, business_id: &str) -> Result<Vec<SettlementEntry>, StoreError>;

    async fn webhook_event_seen(&self, event_id: &str) -> Result<bool, StoreError>;

    /// Records a processed processor event. Returns false if it had already been recorded.
    async fn record_webhook_event(&self, event_id: &str, event_type: &str) -> Result<bool, StoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
    #[error("Cannot insert transaction, since it already exists with id {0}")]
    TransactionAlreadyExists(TransactionId),
    #[error("The requested {0} does not exist")]
    SubjectNotFound(String),
    #[error("{0} cannot be purchased right now")]
    SubjectUnavailable(String),
    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidTransition { id: TransactionId, from: TransactionStatus, to: TransactionStatus },
    #[error("Transaction {id} already has external reference {existing}")]
    ReferenceConflict { id: TransactionId, existing: String },
    #[error("There is no budget ledger for business {0}")]
    LedgerNotFound(String),
    #[error("Transaction {0} is not funded from the budget ledger, or is no longer pending")]
    BudgetNotApplicable(TransactionId),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
