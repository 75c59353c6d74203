use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Cents, FundingPreference, PlanTier, Transaction, TransactionKind};

/// A purchase request, one variant per transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutRequest {
    TicketOrder {
        tier_id: String,
        payer: String,
        quantity: i64,
    },
    Reservation {
        reservation_id: String,
        payer: String,
    },
    OfferPurchase {
        offer_id: String,
        payer: String,
    },
    /// `kind` must be one of the boost kinds. For profile boosts the target is the business itself.
    Boost {
        boost: TransactionKind,
        business_id: String,
        target_id: String,
        starts_at: DateTime<Utc>,
        days: u32,
        #[serde(default)]
        funding: FundingPreference,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Nothing to collect externally. The transaction completed synchronously.
    Completed(Transaction),
    /// Send the payer to `url` to pay.
    Redirect { transaction: Transaction, url: String },
}

impl CheckoutOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Completed(tx) => tx,
            Self::Redirect { transaction, .. } => transaction,
        }
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Redirect { url, .. } => Some(url.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub currency: String,
    /// `{TRANSACTION_ID}` is replaced with the transaction id.
    pub success_url: String,
    pub cancel_url: String,
    /// Upper bound on a session-creation round trip.
    pub session_timeout: StdDuration,
    /// How long a checkout may stay open before it counts as abandoned.
    pub session_lifetime: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            success_url: "http://localhost:8360/checkout/success?transaction_id={TRANSACTION_ID}".to_string(),
            cancel_url: "http://localhost:8360/checkout/cancel?transaction_id={TRANSACTION_ID}".to_string(),
            session_timeout: StdDuration::from_secs(10),
            session_lifetime: Duration::hours(24),
        }
    }
}

/// A payment the processor has confirmed as captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPaymentFact {
    pub amount: Cents,
    pub external_reference: String,
}

impl VerifiedPaymentFact {
    pub fn new(amount: Cents, external_reference: &str) -> Self {
        Self { amount, external_reference: external_reference.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// This call applied the completion.
    Completed(Transaction),
    /// Nothing was done. The transaction had already reached a terminal status.
    AlreadyTerminal(Transaction),
}

impl CompletionOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Completed(tx) | Self::AlreadyTerminal(tx) => tx,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    Processed,
    Duplicate,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// Younger transactions are left alone so that normal checkouts can finish.
    pub min_age: Duration,
    /// Older transactions are presumed abandoned.
    pub max_age: Duration,
    /// Upper bound on each processor lookup.
    pub lookup_timeout: StdDuration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_age: Duration::minutes(30),
            max_age: Duration::hours(24),
            lookup_timeout: StdDuration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub reconciled: usize,
    pub already_terminal: usize,
    pub expired: usize,
    pub cancelled: usize,
    pub flagged: usize,
    pub still_open: usize,
    /// Refunds for cancelled transactions that were asked for again and confirmed by the processor.
    pub refunded: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationSummary {
    pub examined: usize,
    pub activated: usize,
    /// Due boosts whose budget share could not be deducted. Also counted in `errors`.
    pub deferred: usize,
    pub ended: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    pub budget: Cents,
    pub commission_free_offers: i64,
}

impl Allowance {
    pub const fn new(budget: i64, commission_free_offers: i64) -> Self {
        Self { budget: Cents::new(budget), commission_free_offers }
    }
}

/// What each plan tier is granted at the start of every billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAllowances {
    pub basic: Allowance,
    pub pro: Allowance,
    pub premium: Allowance,
}

impl Default for PlanAllowances {
    fn default() -> Self {
        Self { basic: Allowance::new(0, 0), pro: Allowance::new(5_000, 3), premium: Allowance::new(20_000, 10) }
    }
}

impl PlanAllowances {
    pub fn for_plan(&self, plan: PlanTier) -> Allowance {
        match plan {
            PlanTier::Basic => self.basic,
            PlanTier::Pro => self.pro,
            PlanTier::Premium => self.premium,
        }
    }

    pub fn for_plan_mut(&mut self, plan: PlanTier) -> &mut Allowance {
        match plan {
            PlanTier::Basic => &mut self.basic,
            PlanTier::Pro => &mut self.pro,
            PlanTier::Premium => &mut self.premium,
        }
    }

    /// Parses `budget=5000,offers=3`. Missing keys keep the current values.
    pub fn parse_allowance(current: Allowance, s: &str) -> Result<Allowance, String> {
        let mut result = current;
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| format!("Expected key=value, got '{pair}'"))?;
            let value = value.trim().parse::<i64>().map_err(|e| format!("Invalid value for {key}: {e}"))?;
            if value < 0 {
                return Err(format!("{key} cannot be negative"));
            }
            match key.trim() {
                "budget" => result.budget = Cents::from(value),
                "offers" => result.commission_free_offers = value,
                other => return Err(format!("Unknown allowance: {other}")),
            }
        }
        Ok(result)
    }
}

/// How an operator clears a flagged transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Resolution {
    /// Return the transaction to its open status so that the next payment fact or sweep can complete it.
    Retry,
    Cancel { refund: bool },
}
