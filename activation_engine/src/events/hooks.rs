use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    BoostActivatedEvent,
    EventHandler,
    EventProducer,
    Handler,
    TransactionCancelledEvent,
    TransactionExpiredEvent,
    TransactionFlaggedEvent,
    TransactionFulfilledEvent,
};

/// Declares the hook, handler and producer sets for a list of `(hook name, producer field, publish method, event)`
/// entries, so that adding an event touches one line.
macro_rules! event_hooks {
    ($(($hook:ident, $producers:ident, $publish:ident, $event:ty)),+ $(,)?) => {
        /// Optional async callbacks, one per engine event.
        #[derive(Default, Clone)]
        pub struct EventHooks {
            $(pub $hook: Option<Handler<$event>>,)+
        }

        impl EventHooks {
            $(
                pub fn $hook<F>(&mut self, f: F) -> &mut Self
                where F: (Fn($event) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
                    self.$hook = Some(Arc::new(f));
                    self
                }
            )+
        }

        pub struct EventHandlers {
            $(pub $hook: Option<EventHandler<$event>>,)+
        }

        impl EventHandlers {
            pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
                Self { $($hook: hooks.$hook.map(|f| EventHandler::new(buffer_size, f)),)+ }
            }

            pub fn producers(&self) -> EventProducers {
                let mut result = EventProducers::default();
                $(
                    if let Some(handler) = &self.$hook {
                        result.$producers.push(handler.subscribe());
                    }
                )+
                result
            }

            /// Spawns every registered handler. Each one stops once all of its producers are dropped.
            pub fn start_handlers(self) {
                $(
                    if let Some(handler) = self.$hook {
                        tokio::spawn(handler.start_handler());
                    }
                )+
            }
        }

        /// The publishing side of the hooks. Cheap to clone into every API that emits events.
        #[derive(Default, Clone)]
        pub struct EventProducers {
            $(pub $producers: Vec<EventProducer<$event>>,)+
        }

        impl EventProducers {
            /// Adds every producer in `other`, so that one set of APIs can feed several independent handler sets.
            pub fn extend(&mut self, other: EventProducers) {
                $(self.$producers.extend(other.$producers);)+
            }

            $(
                pub async fn $publish(&self, event: $event) {
                    for producer in &self.$producers {
                        producer.publish_event(event.clone()).await;
                    }
                }
            )+
        }
    };
}

event_hooks!(
    (on_transaction_fulfilled, fulfilled_producers, publish_fulfilled, TransactionFulfilledEvent),
    (on_transaction_expired, expired_producers, publish_expired, TransactionExpiredEvent),
    (on_transaction_cancelled, cancelled_producers, publish_cancelled, TransactionCancelledEvent),
    (on_transaction_flagged, flagged_producers, publish_flagged, TransactionFlaggedEvent),
    (on_boost_activated, activated_producers, publish_activated, BoostActivatedEvent),
);
