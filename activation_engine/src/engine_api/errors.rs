use thiserror::Error;

use crate::{
    db_types::{Cents, TransactionId, TransactionStatus},
    traits::StoreError,
};

/// Reasons a checkout is rejected before any transaction row is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} does not exist")]
    SubjectNotFound(String),
    #[error("{0} is not on sale right now")]
    NotOnSale(String),
    #[error("{0} is sold out")]
    SoldOut(String),
    #[error("Purchase limit of {limit} for {subject} would be exceeded")]
    PurchaseLimitExceeded { subject: String, limit: i64 },
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),
    #[error("Invalid boost window. {0}")]
    InvalidWindow(String),
    #[error("{0} is not a boost")]
    NotABoost(String),
    #[error("{0} does not belong to business {1}")]
    WrongBusiness(String, String),
    #[error("Only {0} may pay for this reservation")]
    WrongPayer(String),
    #[error("Business {0} has no payout account and cannot take payments")]
    NoPayoutAccount(String),
    #[error("Transaction {id} cannot be retried from status {status}")]
    NotRetryable { id: TransactionId, status: TransactionStatus },
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
}

/// Reasons a valid checkout could not be paid for. At most a `pending` row is left behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundingError {
    #[error("Business {business_id} does not have {required} left in its promotion budget")]
    InsufficientBudget { business_id: String, required: Cents },
    #[error("Could not open a payment session for {id}. {reason}")]
    SessionUnavailable { id: TransactionId, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Checkout rejected. {0}")]
    Validation(#[from] ValidationError),
    #[error("Checkout could not be funded. {0}")]
    Funding(#[from] FundingError),
    #[error("Internal error during checkout. {0}")]
    Internal(String),
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SubjectNotFound(s) => Self::Validation(ValidationError::SubjectNotFound(s)),
            StoreError::SubjectUnavailable(s) => Self::Validation(ValidationError::NotOnSale(s)),
            StoreError::TransactionNotFound(id) => Self::Validation(ValidationError::TransactionNotFound(id)),
            e => Self::Internal(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
    #[error("Transaction {id} expected a payment of {expected} but {received} was reported. It has been flagged.")]
    AmountMismatch { id: TransactionId, expected: Cents, received: Cents },
    #[error("Transaction {id} belongs to session {expected} but was paid on {received}. It has been flagged.")]
    ReferenceMismatch { id: TransactionId, expected: String, received: String },
    #[error("Transaction {0} is flagged for review and cannot complete")]
    Fenced(TransactionId),
    #[error("Transaction {id} cannot complete from {status}: {reason}")]
    NotPayable { id: TransactionId, status: TransactionStatus, reason: String },
    #[error("Transaction {id} was cancelled. {reason}")]
    InventoryExhausted { id: TransactionId, reason: String },
    #[error("Transaction {id} was cancelled. {reason}")]
    SubjectUnavailable { id: TransactionId, reason: String },
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl CompletionError {
    /// Integrity failures leave the transaction flagged.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::AmountMismatch { .. } | Self::ReferenceMismatch { .. })
    }

    /// The transaction was cancelled because its subject could not be delivered.
    pub fn cancelled_transaction(&self) -> bool {
        matches!(self, Self::InventoryExhausted { .. } | Self::SubjectUnavailable { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Webhook signature is invalid. {0}")]
    InvalidSignature(String),
    #[error("Webhook payload is malformed. {0}")]
    MalformedPayload(String),
    #[error("Webhook could not be processed right now. {0}")]
    Transient(String),
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Amounts must be positive, got {0}")]
    InvalidAmount(Cents),
    #[error("The billing period must end after it starts")]
    InvalidPeriod,
    #[error("Business {0} does not exist")]
    BusinessNotFound(String),
    #[error("{0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Error)]
pub enum AdminError {
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(TransactionId),
    #[error("Transaction {id} is {status}, not flagged")]
    NotFlagged { id: TransactionId, status: TransactionStatus },
    #[error("{0}")]
    Completion(#[from] CompletionError),
    #[error("{0}")]
    Store(#[from] StoreError),
}
