use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, Transaction, TransactionKind};

/// A transaction was paid for and all its effects were applied. Boosts fire this on completion whether they went
/// `scheduled` or `active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFulfilledEvent {
    pub transaction: Transaction,
}

impl TransactionFulfilledEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionExpiredEvent {
    pub transaction: Transaction,
}

impl TransactionExpiredEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }
}

/// Instruction to return money the processor has already captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSignal {
    pub external_reference: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCancelledEvent {
    pub transaction: Transaction,
    pub refund: Option<RefundSignal>,
}

impl TransactionCancelledEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction, refund: None }
    }

    pub fn with_refund(mut self, external_reference: &str, amount: Cents) -> Self {
        self.refund = Some(RefundSignal { external_reference: external_reference.to_string(), amount });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFlaggedEvent {
    pub transaction: Transaction,
    pub reason: String,
}

impl TransactionFlaggedEvent {
    pub fn new(transaction: Transaction, reason: &str) -> Self {
        Self { transaction, reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostActivatedEvent {
    pub transaction: Transaction,
}

impl BoostActivatedEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventType {
    TransactionFulfilled(TransactionFulfilledEvent),
    TransactionExpired(TransactionExpiredEvent),
    TransactionCancelled(TransactionCancelledEvent),
    TransactionFlagged(TransactionFlaggedEvent),
    BoostActivated(BoostActivatedEvent),
}

impl EventType {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::TransactionFulfilled(e) => &e.transaction,
            Self::TransactionExpired(e) => &e.transaction,
            Self::TransactionCancelled(e) => &e.transaction,
            Self::TransactionFlagged(e) => &e.transaction,
            Self::BoostActivated(e) => &e.transaction,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.transaction().kind
    }

    /// The short name used in notification payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransactionFulfilled(_) => "transaction_fulfilled",
            Self::TransactionExpired(_) => "transaction_expired",
            Self::TransactionCancelled(_) => "transaction_cancelled",
            Self::TransactionFlagged(_) => "transaction_flagged",
            Self::BoostActivated(_) => "boost_activated",
        }
    }
}
