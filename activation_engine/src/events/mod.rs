//! Engine events and the hooks that consume them.
//!
//! The engine publishes an event after each committed state change. Handlers are fire-and-forget: a failing
//! notification is logged by its handler and never rolls anything back.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
