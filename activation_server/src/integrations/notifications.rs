//! Forwards engine events to the notification service.
//!
//! Delivery is fire-and-forget. A failed POST is logged and dropped; it never affects the transaction that caused it.
use std::time::Duration;

use activation_engine::{
    db_types::TransactionId,
    events::{EventHandlers, EventHooks, EventType},
};
use log::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 50;
const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

/// The body POSTed for every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: String,
    pub transaction_id: TransactionId,
    pub event: EventType,
}

impl From<EventType> for Notification {
    fn from(event: EventType) -> Self {
        Self { kind: event.name().to_string(), transaction_id: event.transaction().id.clone(), event }
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    url: String,
    client: Client,
}

impl NotificationDispatcher {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(NOTIFICATION_TIMEOUT).build()?;
        Ok(Self { url: url.to_string(), client })
    }

    pub async fn dispatch(&self, event: EventType) {
        let notification = Notification::from(event);
        let id = notification.transaction_id.clone();
        let kind = notification.kind.clone();
        match self.client.post(&self.url).json(&notification).send().await {
            Ok(res) if res.status().is_success() => debug!("📬️ Sent {kind} notification for {id}"),
            Ok(res) => warn!("📬️ Notification service answered {} to {kind} for {id}", res.status()),
            Err(e) => warn!("📬️ Could not deliver {kind} notification for {id}. {e}"),
        }
    }
}

macro_rules! forward {
    ($hooks:ident, $dispatcher:ident, $hook:ident, $variant:ident) => {{
        let dispatcher = $dispatcher.clone();
        $hooks.$hook(move |ev| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move { dispatcher.dispatch(EventType::$variant(ev)).await })
        });
    }};
}

pub fn create_notification_handlers(dispatcher: NotificationDispatcher) -> EventHandlers {
    let mut hooks = EventHooks::default();
    forward!(hooks, dispatcher, on_transaction_fulfilled, TransactionFulfilled);
    forward!(hooks, dispatcher, on_transaction_expired, TransactionExpired);
    forward!(hooks, dispatcher, on_transaction_cancelled, TransactionCancelled);
    forward!(hooks, dispatcher, on_transaction_flagged, TransactionFlagged);
    forward!(hooks, dispatcher, on_boost_activated, BoostActivated);
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
