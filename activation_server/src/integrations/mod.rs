//! Glue between the engine and the outside world: the payment processor and the notification endpoint.
pub mod notifications;
pub mod processor;
