use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{FundingMode, Transaction, TransactionId, TransactionStatus},
    engine_api::{
        engine_objects::{CompletionOutcome, VerifiedPaymentFact},
        errors::CompletionError,
    },
    events::{
        BoostActivatedEvent,
        EventProducers,
        TransactionCancelledEvent,
        TransactionExpiredEvent,
        TransactionFlaggedEvent,
        TransactionFulfilledEvent,
    },
    traits::{CompletionPlan, StoreCompletion, StoreError, TransactionStore, UnavailableReason},
};

/// `CompletionApi` is the single path by which a transaction becomes paid.
///
/// The webhook receiver, the reconciliation sweeper and the checkout initiator all call into it. Correctness under
/// concurrent callers rests on [`TransactionStore::apply_completion`], a compare-and-swap on the status column that
/// carries every effect with it. Exactly one caller wins; the others observe [`CompletionOutcome::AlreadyTerminal`].
///
/// It also owns the other closing transitions (expiry, cancellation, flagging) so that every committed state change
/// publishes its event from one place.
pub struct CompletionApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CompletionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompletionApi")
    }
}

impl<B: Clone> Clone for CompletionApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> CompletionApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> CompletionApi<B>
where B: TransactionStore
{
    /// Completes an externally funded transaction with a payment the processor has confirmed.
    ///
    /// The fact must match the transaction: the amount must equal what the processor was asked to collect, and the
    /// reference must equal the session attached at checkout (if one was attached). A mismatch fences the transaction
    /// into `flagged` and nothing else happens until an operator resolves it.
    pub async fn complete(
        &self,
        id: &TransactionId,
        fact: VerifiedPaymentFact,
    ) -> Result<CompletionOutcome, CompletionError> {
        let tx = self.fetch(id).await?;
        if tx.status.is_terminal() {
            if !tx.status.counts_as_paid() {
                error!(
                    "✅️ A payment of {} on {} arrived for [{id}] after it was closed as {}. It needs a manual refund.",
                    fact.amount, fact.external_reference, tx.status
                );
            }
            trace!("✅️ [{id}] is already {}. Nothing to do.", tx.status);
            return Ok(CompletionOutcome::AlreadyTerminal(tx));
        }
        if tx.status == TransactionStatus::Flagged {
            return Err(CompletionError::Fenced(id.clone()));
        }
        if !tx.funding_mode.needs_processor() {
            return Err(CompletionError::NotPayable {
                id: id.clone(),
                status: tx.status,
                reason: format!("{} transactions are not paid through the processor", tx.funding_mode),
            });
        }
        let expected = tx.external_amount();
        if fact.amount != expected {
            let reason = format!("Payment of {} does not match the expected {expected}", fact.amount);
            self.flag(id, &reason).await?;
            return Err(CompletionError::AmountMismatch { id: id.clone(), expected, received: fact.amount });
        }
        if let Some(expected) = tx.external_reference.as_ref().filter(|r| **r != fact.external_reference) {
            let reason = format!("Payment reference {} does not match session {expected}", fact.external_reference);
            self.flag(id, &reason).await?;
            return Err(CompletionError::ReferenceMismatch {
                id: id.clone(),
                expected: expected.clone(),
                received: fact.external_reference,
            });
        }
        let plan = CompletionPlan::new(Utc::now()).with_reference(&fact.external_reference);
        self.apply(&tx, plan, true).await
    }

    /// Completes a transaction that has nothing to collect externally: a free transaction, or an internal-budget
    /// transaction whose budget share has already been deducted.
    pub async fn complete_funded(&self, id: &TransactionId) -> Result<CompletionOutcome, CompletionError> {
        let tx = self.fetch(id).await?;
        if tx.status.is_terminal() {
            return Ok(CompletionOutcome::AlreadyTerminal(tx));
        }
        let payable = match tx.funding_mode {
            FundingMode::Free => true,
            FundingMode::InternalBudget => tx.budget_deducted,
            FundingMode::ExternalCharge | FundingMode::Mixed => false,
        };
        if !payable {
            return Err(CompletionError::NotPayable {
                id: id.clone(),
                status: tx.status,
                reason: format!("{} transaction has not been funded", tx.funding_mode),
            });
        }
        self.apply(&tx, CompletionPlan::new(Utc::now()), false).await
    }

    async fn apply(
        &self,
        tx: &Transaction,
        plan: CompletionPlan,
        captured: bool,
    ) -> Result<CompletionOutcome, CompletionError> {
        let id = &tx.id;
        let reference = plan.external_reference.clone();
        match self.db.apply_completion(id, plan).await {
            Ok(StoreCompletion::Applied(tx)) => {
                info!("✅️ {} [{id}] completed. It is now {}", tx.kind, tx.status);
                self.producers.publish_fulfilled(TransactionFulfilledEvent::new(tx.clone())).await;
                if tx.status == TransactionStatus::Active {
                    self.producers.publish_activated(BoostActivatedEvent::new(tx.clone())).await;
                }
                Ok(CompletionOutcome::Completed(tx))
            },
            Ok(StoreCompletion::AlreadyApplied(tx)) => {
                debug!("✅️ [{id}] was completed by another caller. It is {}", tx.status);
                Ok(CompletionOutcome::AlreadyTerminal(tx))
            },
            Ok(StoreCompletion::Unavailable(reason)) => {
                let refund = if captured { reference.as_deref() } else { None };
                self.cancel_undeliverable(tx, reason, refund).await
            },
            Err(StoreError::InvalidTransition { from: TransactionStatus::Flagged, .. }) => {
                Err(CompletionError::Fenced(id.clone()))
            },
            Err(StoreError::InvalidTransition { from, .. }) => Err(CompletionError::NotPayable {
                id: id.clone(),
                status: from,
                reason: "The transaction is open but could not be completed".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// The subject sold out (or went away) between checkout and payment. The transaction is cancelled and, if money
    /// was captured, a refund signal goes out with the cancellation event.
    async fn cancel_undeliverable(
        &self,
        tx: &Transaction,
        reason: UnavailableReason,
        captured_reference: Option<&str>,
    ) -> Result<CompletionOutcome, CompletionError> {
        let id = &tx.id;
        let refund = captured_reference.is_some();
        match self.db.cancel_transaction(id, &reason.to_string(), refund).await? {
            Some(cancelled) => {
                warn!("✅️ [{id}] was paid but cannot be delivered. {reason}. Cancelled (refund: {refund}).");
                let mut event = TransactionCancelledEvent::new(cancelled);
                if let Some(reference) = captured_reference {
                    event = event.with_refund(reference, tx.external_amount());
                }
                self.producers.publish_cancelled(event).await;
            },
            None => {
                let latest = self.fetch(id).await?;
                if latest.status.is_terminal() {
                    return Ok(CompletionOutcome::AlreadyTerminal(latest));
                }
            },
        }
        match reason {
            UnavailableReason::InventoryExhausted(reason) => {
                Err(CompletionError::InventoryExhausted { id: id.clone(), reason })
            },
            UnavailableReason::SubjectUnavailable(reason) => {
                Err(CompletionError::SubjectUnavailable { id: id.clone(), reason })
            },
        }
    }

    /// Fences an open transaction for operator review. Returns `None` if it was not open.
    pub async fn flag(&self, id: &TransactionId, reason: &str) -> Result<Option<Transaction>, CompletionError> {
        let flagged = self.db.flag_transaction(id, reason).await?;
        if let Some(tx) = &flagged {
            self.producers.publish_flagged(TransactionFlaggedEvent::new(tx.clone(), reason)).await;
        }
        Ok(flagged)
    }

    /// Expires an open, unpaid transaction and releases what it held. Returns `None` if it was not open.
    pub async fn expire(&self, id: &TransactionId, reason: &str) -> Result<Option<Transaction>, CompletionError> {
        let expired = self.db.expire_transaction(id, reason).await?;
        if let Some(tx) = &expired {
            info!("✅️ [{id}] expired. {reason}");
            self.producers.publish_expired(TransactionExpiredEvent::new(tx.clone())).await;
        }
        Ok(expired)
    }

    /// Cancels a non-terminal transaction. With `refund`, a refund signal is emitted if a processor session exists.
    pub async fn cancel(
        &self,
        id: &TransactionId,
        reason: &str,
        refund: bool,
    ) -> Result<Option<Transaction>, CompletionError> {
        let cancelled = self.db.cancel_transaction(id, reason, refund).await?;
        if let Some(tx) = &cancelled {
            info!("✅️ [{id}] cancelled. {reason}");
            let mut event = TransactionCancelledEvent::new(tx.clone());
            if let Some(reference) = tx.external_reference.as_deref().filter(|_| refund) {
                event = event.with_refund(reference, tx.external_amount());
            }
            self.producers.publish_cancelled(event).await;
        }
        Ok(cancelled)
    }

    async fn fetch(&self, id: &TransactionId) -> Result<Transaction, CompletionError> {
        self.db.fetch_transaction(id).await?.ok_or_else(|| CompletionError::TransactionNotFound(id.clone()))
    }
}
