//! Transactional Activation Engine
//!
//! The activation engine takes money for the things a business sells on the platform (event tickets, table
//! reservations, discounted offers and paid promotion "boosts") and turns each confirmed payment into exactly one set
//! of domain effects. It is payment-processor agnostic: the processor is reached through the
//! [`traits::PaymentProcessor`] trait.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits define the transaction state machine as a set of
//!    atomic, status-guarded operations. SQLite is the supported backend. The data types stored are defined in
//!    [`mod@db_types`] and are public.
//! 2. The engine public API ([`mod@engine_api`]): checkout, completion, webhooks, reconciliation, boost activation,
//!    budget ledgers and operator tooling.
//! 3. Engine events ([`mod@events`]). An event is published after every committed state change so that notifications
//!    and refunds can be hooked in without touching the state machine.
pub mod commission;
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    activation_api::ActivationApi,
    admin_api::AdminApi,
    checkout_api::{CheckoutApi, PLATFORM_PAYEE},
    completion_api::CompletionApi,
    engine_objects,
    errors::{AdminError, CheckoutError, CompletionError, FundingError, LedgerError, ValidationError, WebhookError},
    ledger_api::LedgerApi,
    reconciliation_api::ReconciliationApi,
    webhook_api::WebhookApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{BudgetLedger, CatalogManagement, PaymentProcessor, StoreError, TransactionStore};
