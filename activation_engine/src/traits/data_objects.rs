use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{BudgetLedgerEntry, FundingMode, Transaction, TransactionKind, TransactionStatus};

/// Outcome of deducting an `internal_budget` transaction's budget share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetReservation {
    Reserved(Transaction),
    /// A previous attempt already deducted the budget. Nothing changed.
    AlreadyReserved(Transaction),
    /// The ledger could not cover the amount. Nothing changed.
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionPlan {
    pub now: DateTime<Utc>,
    /// The processor reference confirmed by the payment fact, for externally funded transactions.
    pub external_reference: Option<String>,
}

impl CompletionPlan {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now, external_reference: None }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.external_reference = Some(reference.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Capacity or stock ran out between checkout and completion.
    InventoryExhausted(String),
    /// The subject can no longer be delivered (e.g. the reservation was accepted or cancelled elsewhere).
    SubjectUnavailable(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InventoryExhausted(s) => write!(f, "Inventory exhausted: {s}"),
            Self::SubjectUnavailable(s) => write!(f, "Subject unavailable: {s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCompletion {
    /// This call won the status swap and applied every effect.
    Applied(Transaction),
    /// Another caller had already moved the transaction out of its open status. Nothing changed.
    AlreadyApplied(Transaction),
    /// The kind-specific effect could not be applied. Nothing changed.
    Unavailable(UnavailableReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationResult {
    Activated(Transaction),
    /// The boost is due but its deferred budget share could not be deducted. It stays `scheduled`.
    Deferred(String),
    /// Not scheduled, or not yet due. Nothing changed.
    NotDue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset(BudgetLedgerEntry),
    /// The ledger is already on the requested period.
    Unchanged(BudgetLedgerEntry),
}

impl ResetOutcome {
    pub fn entry(&self) -> &BudgetLedgerEntry {
        match self {
            Self::Reset(e) | Self::Unchanged(e) => e,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreeOfferClaim {
    Claimed(BudgetLedgerEntry),
    AlreadyCommissionFree,
    Exhausted,
}

/// Creation-time window scanned by the reconciliation sweep: `oldest <= created_at <= newest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepWindow {
    pub oldest: DateTime<Utc>,
    pub newest: DateTime<Utc>,
}

impl SweepWindow {
    pub fn ending_at(now: DateTime<Utc>, min_age: Duration, max_age: Duration) -> Self {
        Self { oldest: now - max_age, newest: now - min_age }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQueryFilter {
    pub status: Option<Vec<TransactionStatus>>,
    pub kind: Option<TransactionKind>,
    pub funding_mode: Option<FundingMode>,
    pub payer_ref: Option<String>,
    pub payee_ref: Option<String>,
    pub subject_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TransactionQueryFilter {
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_funding_mode(mut self, mode: FundingMode) -> Self {
        self.funding_mode = Some(mode);
        self
    }

    pub fn with_payer(mut self, payer: &str) -> Self {
        self.payer_ref = Some(payer.to_string());
        self
    }

    pub fn with_payee(mut self, payee: &str) -> Self {
        self.payee_ref = Some(payee.to_string());
        self
    }

    pub fn with_subject(mut self, subject_id: &str) -> Self {
        self.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.kind.is_none() &&
            self.funding_mode.is_none() &&
            self.payer_ref.is_none() &&
            self.payee_ref.is_none() &&
            self.subject_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}
