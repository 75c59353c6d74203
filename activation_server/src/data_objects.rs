use std::fmt::Display;

use activation_engine::{
    db_types::{BudgetLedgerEntry, Cents, TransactionId, TransactionStatus},
    engine_objects::CheckoutOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// What a client needs to carry on after `POST /checkout`: where to send the payer, if anywhere, and the id to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        let redirect_url = outcome.redirect_url().map(String::from);
        let tx = outcome.transaction();
        Self { transaction_id: tx.id.clone(), status: tx.status, redirect_url }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResetRequest {
    pub budget: Cents,
    #[serde(default)]
    pub commission_free_offers: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResetResponse {
    /// False if the ledger was already on the requested period and nothing changed.
    pub reset: bool,
    pub ledger: BudgetLedgerEntry,
}
