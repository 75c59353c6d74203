//! Stateless pub-sub channel for engine events.
//!
//! Handlers only ever see the event they are given. They run on their own tasks, so a slow notification webhook can
//! never hold up a completion.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Dispatches events until every producer has been dropped, then waits for the in-flight handlers to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Event handler started");
        // Only producers may keep the channel open.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            // Reap finished jobs so the set does not grow without bound.
            while let Some(done) = jobs.try_join_next() {
                if let Err(e) = done {
                    warn!("📬️ An event handler panicked or was aborted. {e}");
                }
            }
        }
        while let Some(done) = jobs.join_next().await {
            if let Err(e) = done {
                warn!("📬️ An event handler panicked or was aborted. {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Could not publish event. The handler has gone away. {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn every_event_is_handled_before_shutdown() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let seen = total.clone();
        let handler: Handler<u64> = Arc::new(move |v| {
            let total = total.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                total.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(2, handler);
        let webhook = event_handler.subscribe();
        let sweeper = event_handler.subscribe();
        tokio::spawn(async move {
            for v in [1, 3, 5, 7, 9] {
                webhook.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for v in [0, 2, 4, 6, 8] {
                sweeper.publish_event(v).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 45);
    }
}
