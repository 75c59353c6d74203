//! Client for the external card payment processor.
//!
//! The processor hosts the checkout page. This crate opens and inspects checkout sessions, issues refunds and
//! authenticates the webhook events the processor sends back. It knows nothing about the activation engine; the server
//! glues the two together.
mod api;
mod config;
mod data_objects;
mod error;
pub mod webhook;

pub use api::ProcessorApi;
pub use config::ProcessorConfig;
pub use data_objects::{
    CheckoutSessionObject,
    EventEnvelope,
    EventPayload,
    InvoiceObject,
    NewCheckoutSession,
    NewRefund,
    PaymentStatus,
    RefundObject,
    SessionStatusCode,
    TransferData,
};
pub use error::ProcessorApiError;
