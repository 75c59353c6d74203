use std::{collections::HashSet, fmt::Debug};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{FundingMode, Transaction, TransactionId, TransactionStatus},
    engine_api::{
        completion_api::CompletionApi,
        engine_objects::{CompletionOutcome, SweepConfig, SweepSummary, VerifiedPaymentFact},
        errors::CompletionError,
    },
    traits::{PaymentProcessor, ProcessorError, SessionState, SessionStatus, SweepWindow, TransactionStore},
};

/// `ReconciliationApi` is the safety net behind the webhook receiver.
///
/// Webhooks can be lost, delayed or delivered while the server is down. The sweep asks the processor for the ground
/// truth of every open transaction old enough to have settled, and feeds what it learns through the same completion
/// path the webhook uses. A second pass expires whatever has been open for too long, and a last one asks again for
/// refunds the processor never confirmed.
///
/// A sweep never aborts on a per-transaction failure. The failure is logged and counted, and the next sweep tries
/// again.
pub struct ReconciliationApi<B, P> {
    db: B,
    processor: P,
    completion: CompletionApi<B>,
    config: SweepConfig,
}

impl<B, P> Debug for ReconciliationApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.config)
    }
}

enum Step {
    Completion(Result<CompletionOutcome, CompletionError>),
    Expired,
    StillOpen,
    Failed,
}

impl<B, P> ReconciliationApi<B, P>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    pub fn new(processor: P, completion: CompletionApi<B>) -> Self {
        Self { db: completion.db().clone(), processor, completion, config: SweepConfig::default() }
    }

    pub fn with_config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs one reconciliation sweep as of `now`.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let mut seen = HashSet::new();

        let window = SweepWindow::ending_at(now, self.config.min_age, self.config.max_age);
        match self.db.reconciliation_candidates(window).await {
            Ok(candidates) => {
                let n = candidates.len();
                debug!("🧹️ {n} transactions to reconcile between {} and {}", window.oldest, window.newest);
                for tx in candidates {
                    seen.insert(tx.id.clone());
                    summary.examined += 1;
                    let step = self.reconcile(&tx).await;
                    tally(&mut summary, &tx.id, step);
                }
            },
            Err(e) => {
                error!("🧹️ Could not fetch transactions to reconcile. {e}");
                summary.errors += 1;
            },
        }

        match self.db.abandoned_transactions(now, self.config.max_age).await {
            Ok(abandoned) => {
                debug!("🧹️ {} abandoned transactions", abandoned.len());
                for tx in abandoned {
                    if seen.insert(tx.id.clone()) {
                        summary.examined += 1;
                    }
                    let step = self.close_abandoned(&tx).await;
                    tally(&mut summary, &tx.id, step);
                }
            },
            Err(e) => {
                error!("🧹️ Could not fetch abandoned transactions. {e}");
                summary.errors += 1;
            },
        }
        self.retry_refunds(now, &mut summary).await;
        info!("🧹️ Sweep finished. {summary:?}");
        summary
    }

    /// Asks the processor again for every refund it has not confirmed. Refunds are keyed on the session at the
    /// processor, so asking twice never pays out twice.
    async fn retry_refunds(&self, now: DateTime<Utc>, summary: &mut SweepSummary) {
        let pending = match self.db.unconfirmed_refunds(now - self.config.min_age).await {
            Ok(pending) => pending,
            Err(e) => {
                error!("🧹️ Could not fetch unconfirmed refunds. {e}");
                summary.errors += 1;
                return;
            },
        };
        if !pending.is_empty() {
            debug!("🧹️ {} cancelled transactions are waiting on a refund", pending.len());
        }
        for tx in pending {
            let Some(reference) = tx.external_reference.as_deref() else { continue };
            let amount = tx.external_amount();
            let requested =
                tokio::time::timeout(self.config.lookup_timeout, self.processor.request_refund(reference, amount))
                    .await
                    .map_err(|_| ProcessorError::Timeout)
                    .and_then(|r| r);
            if let Err(e) = requested {
                warn!("🧹️ Refund of {amount} on {reference} for [{}] failed again. {e}", tx.id);
                summary.errors += 1;
                continue;
            }
            match self.db.confirm_refund(&tx.id).await {
                Ok(_) => {
                    info!("🧹️ Refund of {amount} on {reference} for [{}] confirmed", tx.id);
                    summary.refunded += 1;
                },
                Err(e) => {
                    error!("🧹️ Refund for [{}] went through but could not be recorded. {e}", tx.id);
                    summary.errors += 1;
                },
            }
        }
    }

    async fn reconcile(&self, tx: &Transaction) -> Step {
        match (tx.status, tx.external_reference.as_deref()) {
            (TransactionStatus::AwaitingExternalPayment, Some(reference)) => match self.lookup(reference).await {
                Ok(status) => self.apply_session_status(tx, status, false).await,
                Err(e) => {
                    warn!("🧹️ Could not look up session {reference} for [{}]. {e}", tx.id);
                    Step::Failed
                },
            },
            (_, None) => match tx.funding_mode {
                FundingMode::Free => Step::Completion(self.completion.complete_funded(&tx.id).await),
                FundingMode::InternalBudget if tx.budget_deducted => {
                    Step::Completion(self.completion.complete_funded(&tx.id).await)
                },
                FundingMode::InternalBudget => self.expire(tx, "Budget was never deducted").await,
                // The checkout may still attach a session. The abandonment pass closes it if it never does.
                FundingMode::ExternalCharge | FundingMode::Mixed => Step::StillOpen,
            },
            (status, Some(_)) => {
                warn!("🧹️ [{}] is {status} but already has a session attached", tx.id);
                Step::StillOpen
            },
        }
    }

    async fn close_abandoned(&self, tx: &Transaction) -> Step {
        if let Some(reference) = tx.external_reference.as_deref() {
            // One last look before giving up on it. The payer may have paid at the last moment.
            return match self.lookup(reference).await {
                Ok(status) => self.apply_session_status(tx, status, true).await,
                Err(e) => {
                    warn!("🧹️ Could not look up session {reference} for abandoned [{}]. {e}", tx.id);
                    Step::Failed
                },
            };
        }
        match tx.funding_mode {
            FundingMode::Free => Step::Completion(self.completion.complete_funded(&tx.id).await),
            FundingMode::InternalBudget if tx.budget_deducted => {
                Step::Completion(self.completion.complete_funded(&tx.id).await)
            },
            _ => self.expire(tx, "Abandoned before payment").await,
        }
    }

    async fn apply_session_status(&self, tx: &Transaction, status: SessionStatus, abandoned: bool) -> Step {
        match status.state {
            SessionState::Paid => {
                let fact = VerifiedPaymentFact::new(status.amount_total, &status.reference);
                Step::Completion(self.completion.complete(&tx.id, fact).await)
            },
            SessionState::Expired => self.expire(tx, "Checkout session expired without payment").await,
            SessionState::Open if abandoned => self.close_open_session(tx, &status.reference).await,
            SessionState::Open => Step::StillOpen,
        }
    }

    /// An unpaid session outlived the abandonment ceiling. Close it at the processor first so that a late payment
    /// cannot land on a transaction we have already expired, then release the transaction.
    async fn close_open_session(&self, tx: &Transaction, reference: &str) -> Step {
        let closed = tokio::time::timeout(self.config.lookup_timeout, self.processor.expire_session(reference))
            .await
            .map_err(|_| ProcessorError::Timeout)
            .and_then(|r| r);
        match closed {
            Ok(status) if status.state == SessionState::Paid => {
                debug!("🧹️ Session {reference} for [{}] was paid at the last moment", tx.id);
                let fact = VerifiedPaymentFact::new(status.amount_total, &status.reference);
                Step::Completion(self.completion.complete(&tx.id, fact).await)
            },
            Ok(_) => self.expire(tx, "Abandoned with an unpaid checkout session").await,
            Err(e) => {
                warn!("🧹️ Could not close session {reference} for abandoned [{}]. Expiring it anyway. {e}", tx.id);
                self.expire(tx, "Abandoned with an unpaid checkout session").await
            },
        }
    }

    async fn lookup(&self, reference: &str) -> Result<SessionStatus, ProcessorError> {
        tokio::time::timeout(self.config.lookup_timeout, self.processor.retrieve_session(reference))
            .await
            .map_err(|_| ProcessorError::Timeout)?
    }

    async fn expire(&self, tx: &Transaction, reason: &str) -> Step {
        match self.completion.expire(&tx.id, reason).await {
            Ok(Some(_)) => Step::Expired,
            Ok(None) => {
                debug!("🧹️ [{}] was closed by another caller before it could expire", tx.id);
                Step::StillOpen
            },
            Err(e) => {
                error!("🧹️ Could not expire [{}]. {e}", tx.id);
                Step::Failed
            },
        }
    }
}

fn tally(summary: &mut SweepSummary, id: &TransactionId, step: Step) {
    match step {
        Step::Completion(Ok(CompletionOutcome::Completed(_))) => summary.reconciled += 1,
        Step::Completion(Ok(CompletionOutcome::AlreadyTerminal(_))) => summary.already_terminal += 1,
        Step::Completion(Err(e)) if e.is_integrity_failure() => {
            warn!("🧹️ [{id}] was flagged. {e}");
            summary.flagged += 1;
        },
        Step::Completion(Err(e)) if e.cancelled_transaction() => {
            warn!("🧹️ [{id}] was cancelled. {e}");
            summary.cancelled += 1;
        },
        Step::Completion(Err(CompletionError::Fenced(_))) => summary.still_open += 1,
        Step::Completion(Err(e)) => {
            error!("🧹️ Could not reconcile [{id}]. {e}");
            summary.errors += 1;
        },
        Step::Expired => summary.expired += 1,
        Step::StillOpen => summary.still_open += 1,
        Step::Failed => summary.errors += 1,
    }
}
