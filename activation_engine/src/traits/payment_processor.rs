use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Cents, PlanTier, TransactionId};

/// Everything the processor needs to open a hosted checkout page for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    /// Carried as opaque correlation metadata and echoed back in webhooks.
    pub transaction_id: TransactionId,
    pub amount: Cents,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub split: Option<SplitDirective>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Settle the charge to `destination`, keeping `application_fee` for the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDirective {
    pub destination: String,
    pub application_fee: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub reference: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Paid,
    Expired,
}

/// Ground truth for a session, as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub reference: String,
    pub transaction_id: Option<TransactionId>,
    pub state: SessionState,
    pub amount_total: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorEventKind {
    /// The hosted checkout finished. `paid` is false for delayed payment methods that have not yet captured.
    CheckoutCompleted { transaction_id: TransactionId, external_reference: String, amount: Cents, paid: bool },
    /// The hosted checkout expired without payment.
    CheckoutExpired { transaction_id: TransactionId, external_reference: String },
    /// A subscription invoice was paid and a new billing period has started.
    SubscriptionRenewed {
        business_id: String,
        plan_tier: PlanTier,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    },
    /// Anything the engine does not act on.
    Other,
}

/// An authenticated processor event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorEvent {
    pub id: String,
    pub event_type: String,
    pub kind: ProcessorEventKind,
}

#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("Webhook signature could not be verified. {0}")]
    InvalidSignature(String),
    #[error("Webhook payload could not be parsed. {0}")]
    MalformedPayload(String),
    #[error("The payment processor is unavailable. {0}")]
    Unavailable(String),
    #[error("The payment processor rejected the request. {0}")]
    Rejected(String),
    #[error("The payment processor did not answer in time")]
    Timeout,
}

impl ProcessorError {
    /// True if retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// The external payment processor, as seen by the engine.
///
/// One instance is constructed per process and cloned into each API that needs it.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor: Clone {
    async fn create_checkout_session(&self, request: &CheckoutSessionRequest)
        -> Result<CheckoutSession, ProcessorError>;

    async fn retrieve_session(&self, reference: &str) -> Result<SessionStatus, ProcessorError>;

    /// Closes an unpaid session so that a late payment can no longer land on it. Returns the session as it stands
    /// afterwards; a session that was paid in the meantime comes back `Paid`.
    async fn expire_session(&self, reference: &str) -> Result<SessionStatus, ProcessorError>;

    async fn request_refund(&self, reference: &str, amount: Cents) -> Result<(), ProcessorError>;

    /// Authenticates `payload` against `signature` and decodes it. Never returns an event for a payload that failed
    /// verification.
    fn parse_webhook(&self, payload: &[u8], signature: &str) -> Result<ProcessorEvent, ProcessorError>;
}
