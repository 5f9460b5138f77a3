//! Simple stateless pub-sub event handler
//!
//! Outcome events (payment succeeded/failed, refund succeeded/failed) are how the surrounding application learns
//! about reconciliation results. Publication is fire-and-forget: a subscriber that panics or lags can never fail or
//! roll back the reconciliation that triggered the event. Handlers receive only the event itself and may be async.

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

    /// Run the handler loop until every producer has been dropped, then drain outstanding handler tasks.
    pub async fn start_handler(mut self) {
        debug!("📨️ Starting event handler");
        // Drop the internal sender so the loop ends once the last subscriber goes away.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(event) = self.listener.recv().await {
            trace!("📨️ Handling event");
            let handler = Arc::clone(&self.handler);
            // Each event runs in its own task: a panicking subscriber is isolated and logged below.
            jobs.spawn(async move {
                (handler)(event).await;
            });
        }
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!("📨️ An event subscriber failed: {e}. The triggering operation is unaffected.");
            }
        }
        debug!("📨️ Event handler has shut down");
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
            error!("📨️ Failed to send event: {e}");
        }
    }
}
