use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

pub use tae_common::{BasisPoints, Cents};

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Generates `Display` and `FromStr` for a unit enum from a single table of `Variant => "text"` pairs.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("Invalid {}: {s}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------   TransactionId     ---------------------------------------------------------
/// Opaque identifier of a transaction. Generated at creation and carried as correlation metadata on processor sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TransactionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------  TransactionKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    TicketOrder,
    Reservation,
    OfferPurchase,
    ProfileBoost,
    EventBoost,
    OfferBoost,
}

text_enum!(TransactionKind {
    TicketOrder => "ticket_order",
    Reservation => "reservation",
    OfferPurchase => "offer_purchase",
    ProfileBoost => "profile_boost",
    EventBoost => "event_boost",
    OfferBoost => "offer_boost",
});

impl TransactionKind {
    pub fn is_boost(&self) -> bool {
        matches!(self, Self::ProfileBoost | Self::EventBoost | Self::OfferBoost)
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, no processor session attached (yet).
    Pending,
    /// A processor session is open and we are waiting for the payer.
    AwaitingExternalPayment,
    /// Integrity fence. Needs an operator before anything else may happen to this transaction.
    Flagged,
    /// Paid and all effects applied.
    Fulfilled,
    /// Boost paid for, but its window has not started.
    Scheduled,
    /// Boost paid for and currently running.
    Active,
    /// Boost window has closed.
    Ended,
    /// Abandoned without payment.
    Expired,
    /// Cancelled. Any captured payment has been flagged for refund.
    Cancelled,
}

text_enum!(TransactionStatus {
    Pending => "pending",
    AwaitingExternalPayment => "awaiting_external_payment",
    Flagged => "flagged",
    Fulfilled => "fulfilled",
    Scheduled => "scheduled",
    Active => "active",
    Ended => "ended",
    Expired => "expired",
    Cancelled => "cancelled",
});

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction status: {value}. But this conversion cannot fail. Defaulting to Flagged");
            TransactionStatus::Flagged
        })
    }
}

impl TransactionStatus {
    /// Terminal for payment purposes. Only the activation scheduler may move a boost between its terminal states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::AwaitingExternalPayment | Self::Flagged)
    }

    /// Statuses from which a payment may still complete.
    pub fn open_statuses() -> &'static [TransactionStatus] {
        &[Self::Pending, Self::AwaitingExternalPayment]
    }

    pub fn counts_as_paid(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Scheduled | Self::Active | Self::Ended)
    }
}

//--------------------------------------    FundingMode      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FundingMode {
    ExternalCharge,
    InternalBudget,
    Mixed,
    Free,
}

text_enum!(FundingMode {
    ExternalCharge => "external_charge",
    InternalBudget => "internal_budget",
    Mixed => "mixed",
    Free => "free",
});

impl FundingMode {
    pub fn needs_processor(&self) -> bool {
        matches!(self, Self::ExternalCharge | Self::Mixed)
    }
}

/// How the buyer of a boost would like to pay. Ignored for every other kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingPreference {
    #[default]
    External,
    BudgetFirst,
}

//--------------------------------------      PlanTier       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Basic,
    Pro,
    Premium,
}

text_enum!(PlanTier {
    Basic => "basic",
    Pro => "pro",
    Premium => "premium",
});

//--------------------------------------     EffectType      ---------------------------------------------------------
/// The side effects that must each be applied at most once per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Fulfilment,
    BudgetDeduction,
    Release,
    Cancellation,
    Refund,
}

text_enum!(EffectType {
    Fulfilment => "fulfilment",
    BudgetDeduction => "budget_deduction",
    Release => "release",
    Cancellation => "cancellation",
    Refund => "refund",
});

//--------------------------------------     Transaction     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    /// The entity being bought: ticket tier, reservation, offer, or the boost target.
    pub subject_id: String,
    /// The parent of the subject, where it has one (e.g. the event of a ticket tier).
    pub parent_subject_id: Option<String>,
    pub quantity: i64,
    pub payer_ref: String,
    pub payee_ref: String,
    pub amount_gross_cents: Cents,
    pub commission_cents: Cents,
    pub amount_net_cents: Cents,
    pub funding_mode: FundingMode,
    pub partial_budget_cents: Cents,
    pub budget_deducted: bool,
    pub external_reference: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Why the transaction was last flagged, cancelled or expired.
    pub status_reason: Option<String>,
    pub refund_requested_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// The amount the payment processor is expected to collect.
    pub fn external_amount(&self) -> Cents {
        match self.funding_mode {
            FundingMode::ExternalCharge => self.amount_gross_cents,
            FundingMode::Mixed => self.amount_gross_cents - self.partial_budget_cents,
            FundingMode::InternalBudget | FundingMode::Free => Cents::zero(),
        }
    }

    pub fn fingerprint(&self, effect: EffectType) -> String {
        crate::helpers::idempotency_fingerprint(&self.id, effect)
    }

    pub fn amounts_balance(&self) -> bool {
        self.amount_net_cents + self.commission_cents == self.amount_gross_cents &&
            !self.amount_net_cents.is_negative()
    }
}

//--------------------------------------   NewTransaction    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub subject_id: String,
    pub parent_subject_id: Option<String>,
    pub quantity: i64,
    pub payer_ref: String,
    pub payee_ref: String,
    pub amount_gross_cents: Cents,
    pub commission_cents: Cents,
    pub amount_net_cents: Cents,
    pub funding_mode: FundingMode,
    pub partial_budget_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn new(kind: TransactionKind, subject_id: &str, payer_ref: &str, payee_ref: &str) -> Self {
        Self {
            id: TransactionId::generate(),
            kind,
            subject_id: subject_id.to_string(),
            parent_subject_id: None,
            quantity: 1,
            payer_ref: payer_ref.to_string(),
            payee_ref: payee_ref.to_string(),
            amount_gross_cents: Cents::zero(),
            commission_cents: Cents::zero(),
            amount_net_cents: Cents::zero(),
            funding_mode: FundingMode::ExternalCharge,
            partial_budget_cents: Cents::zero(),
            created_at: Utc::now(),
            expires_at: None,
            starts_at: None,
            ends_at: None,
        }
    }

    pub fn with_amounts(mut self, gross: Cents, commission: Cents) -> Self {
        self.amount_gross_cents = gross;
        self.commission_cents = commission;
        self.amount_net_cents = gross - commission;
        self
    }

    pub fn with_funding(mut self, mode: FundingMode, partial_budget: Cents) -> Self {
        self.funding_mode = mode;
        self.partial_budget_cents = partial_budget;
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent_subject_id = Some(parent.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_window(mut self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        self.starts_at = Some(starts_at);
        self.ends_at = Some(ends_at);
        self
    }
}

//--------------------------------------  BudgetLedgerEntry  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BudgetLedgerEntry {
    pub business_id: String,
    pub monthly_budget_remaining_cents: Cents,
    pub commission_free_offers_remaining: i64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  SettlementEntry    ---------------------------------------------------------
/// The durable record of what is owed to a business for one paid transaction.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub transaction_id: TransactionId,
    pub business_id: String,
    pub gross_cents: Cents,
    pub commission_cents: Cents,
    pub net_cents: Cents,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     EffectRecord    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct EffectRecord {
    pub fingerprint: String,
    pub transaction_id: TransactionId,
    pub effect: EffectType,
    pub applied_at: DateTime<Utc>,
}

//--------------------------------------      Catalog        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub plan_tier: PlanTier,
    /// The processor account that receives split payments. Businesses without one cannot sell.
    pub payout_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub business_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TicketTier {
    pub id: String,
    pub event_id: String,
    pub business_id: String,
    pub price_cents: Cents,
    pub capacity: i64,
    pub quantity_sold: i64,
    pub per_user_limit: Option<i64>,
    pub sales_start: Option<DateTime<Utc>>,
    pub sales_end: Option<DateTime<Utc>>,
}

impl TicketTier {
    pub fn remaining(&self) -> i64 {
        (self.capacity - self.quantity_sold).max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub code: String,
    pub transaction_id: TransactionId,
    pub tier_id: String,
    pub holder: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Requested,
    PaymentPending,
    Accepted,
    Cancelled,
}

text_enum!(ReservationStatus {
    Requested => "requested",
    PaymentPending => "payment_pending",
    Accepted => "accepted",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub business_id: String,
    pub customer: String,
    pub deposit_cents: Cents,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub business_id: String,
    pub original_price_cents: Cents,
    pub discount_percent: i64,
    /// `None` means unlimited.
    pub stock: Option<i64>,
    pub quantity_sold: i64,
    pub per_user_limit: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub commission_free: bool,
}

impl Offer {
    /// Price after discount, rounded half-up to the cent.
    pub fn discounted_price(&self) -> Cents {
        let keep = BasisPoints::from_percent(self.discount_percent.clamp(0, 100) as u32).complement();
        self.original_price_cents.apply_bps(keep)
    }

    pub fn in_stock(&self) -> bool {
        self.stock.map(|s| self.quantity_sold < s).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Paid,
    Expired,
    Cancelled,
}

text_enum!(PurchaseStatus {
    Pending => "pending",
    Paid => "paid",
    Expired => "expired",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OfferPurchase {
    pub transaction_id: TransactionId,
    pub offer_id: String,
    pub payer: String,
    pub status: PurchaseStatus,
    pub redemption_token: Option<String>,
    pub created_at: DateTime<Utc>,
}
