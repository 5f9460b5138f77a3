use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    PaymentFailedEvent,
    PaymentSucceededEvent,
    RefundFailedEvent,
    RefundSucceededEvent,
};

/// The producer ends of the event channels, held by the engine. Cloneable so every API instance can publish.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_succeeded_producers: Vec<EventProducer<PaymentSucceededEvent>>,
    pub payment_failed_producers: Vec<EventProducer<PaymentFailedEvent>>,
    pub refund_succeeded_producers: Vec<EventProducer<RefundSucceededEvent>>,
    pub refund_failed_producers: Vec<EventProducer<RefundFailedEvent>>,
}

pub struct EventHandlers {
    pub on_payment_succeeded: Option<EventHandler<PaymentSucceededEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_refund_succeeded: Option<EventHandler<RefundSucceededEvent>>,
    pub on_refund_failed: Option<EventHandler<RefundFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_payment_succeeded: hooks.on_payment_succeeded.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_failed: hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f)),
            on_refund_succeeded: hooks.on_refund_succeeded.map(|f| EventHandler::new(buffer_size, f)),
            on_refund_failed: hooks.on_refund_failed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_succeeded {
            result.payment_succeeded_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_succeeded {
            result.refund_succeeded_producers.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_failed {
            result.refund_failed_producers.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_succeeded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_succeeded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_failed {
            tokio::spawn(handler.start_handler());
        }
    }
}

/// The subscriber callbacks the surrounding application registers before constructing the engine.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_succeeded: Option<Handler<PaymentSucceededEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_refund_succeeded: Option<Handler<RefundSucceededEvent>>,
    pub on_refund_failed: Option<Handler<RefundFailedEvent>>,
}

impl EventHooks {
    pub fn on_payment_succeeded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSucceededEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_succeeded = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_refund_succeeded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundSucceededEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_refund_succeeded = Some(Arc::new(f));
        self
    }

    pub fn on_refund_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_refund_failed = Some(Arc::new(f));
        self
    }
}
