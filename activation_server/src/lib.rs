//! # Activation server
//! The HTTP front end and background workers for the transactional activation engine. It is responsible for:
//! * Accepting checkout requests and handing payers off to the payment processor.
//! * Receiving the processor's webhooks and feeding verified payment facts to the engine.
//! * Running the reconciliation sweep and the boost activation scheduler on a timer.
//! * Forwarding engine events to the notification service, and requesting refunds for cancelled purchases.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `GET /health`: Returns 200 OK.
//! * `POST /checkout`: Starts a purchase.
//! * `GET /transactions/{id}`, `POST /transactions/{id}/retry`: Polling and session retries for clients.
//! * `POST /webhook/processor`: Processor event notifications.
//! * `/admin/*`: Operator endpoints, guarded by a bearer token.

pub mod activation_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;

#[cfg(test)]
mod endpoint_tests;
