//! # Activation engine public API
//!
//! The `engine_api` module exposes the programmatic API of the activation engine. It is split by responsibility so
//! that each caller only holds what it uses:
//!
//! * [`checkout_api`] validates a purchase, prices it, decides how it is funded and opens the processor session.
//! * [`completion_api`] is the only path by which a transaction becomes paid. It also owns expiry, cancellation and
//!   flagging, and publishes an event for every state change it commits.
//! * [`webhook_api`] authenticates processor push notifications and routes them to the completion and ledger APIs.
//! * [`reconciliation_api`] runs the periodic sweep that catches lost webhooks and expires abandoned transactions.
//! * [`activation_api`] moves paid boosts through their scheduled window.
//! * [`ledger_api`] manages monthly promotion budgets and commission-free-offer credits.
//! * [`admin_api`] lets operators inspect transactions and resolve flagged ones.
//!
//! # API usage
//!
//! Every API is created from a backend that implements the traits in [`crate::traits`]. The completion API is shared
//! by the others, so that they all publish events through the same producers.
//!
//! ```rust,ignore
//! use activation_engine::{CheckoutApi, CompletionApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let completion = CompletionApi::new(db.clone(), EventProducers::default());
//! let checkout = CheckoutApi::new(processor, completion.clone());
//! let outcome = checkout.initiate_checkout(request).await?;
//! ```

pub mod activation_api;
pub mod admin_api;
pub mod checkout_api;
pub mod completion_api;
pub mod engine_objects;
pub mod errors;
pub mod ledger_api;
pub mod reconciliation_api;
pub mod webhook_api;
