//! # Backend and collaborator contracts
//!
//! The traits in this module define what the engine needs from the outside world. The engine APIs in
//! [`crate::engine_api`] are generic over them, and hold no other state.
//!
//! * [`TransactionStore`] is the highest-level backend contract. It owns the transaction state machine and exposes
//!   each state change as a single atomic operation. Every transition is a compare-and-swap on the status column so
//!   that the webhook receiver, the reconciliation sweeper and the checkout path can race safely.
//! * [`BudgetLedger`] owns each business's monthly promotion budget and commission-free-offer counter.
//! * [`CatalogManagement`] is the thin slice of domain data (tiers, offers, reservations, plans) that the engine
//!   validates purchases against and mutates when a transaction completes.
//! * [`PaymentProcessor`] is the external card processor: checkout sessions, status lookups, refunds and webhook
//!   authentication.
mod budget_ledger;
mod catalog_management;
mod data_objects;
mod payment_processor;
mod transaction_store;

pub use budget_ledger::BudgetLedger;
pub use catalog_management::CatalogManagement;
pub use data_objects::{
    ActivationResult,
    BudgetReservation,
    CompletionPlan,
    FreeOfferClaim,
    ResetOutcome,
    StoreCompletion,
    SweepWindow,
    TransactionQueryFilter,
    UnavailableReason,
};
pub use payment_processor::{
    CheckoutSession,
    CheckoutSessionRequest,
    PaymentProcessor,
    ProcessorError,
    ProcessorEvent,
    ProcessorEventKind,
    SessionState,
    SessionStatus,
    SplitDirective,
};
pub use transaction_store::{StoreError, TransactionStore};
