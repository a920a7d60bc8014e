use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{EventHandler, EventProducer, Handler, OrderSettledEvent, PayoutSubmittedEvent};

/// The publishing side of the hooks. Cheap to clone. Every API that changes order state holds a copy.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_settled_producer: Vec<EventProducer<OrderSettledEvent>>,
    pub payout_submitted_producer: Vec<EventProducer<PayoutSubmittedEvent>>,
}

impl EventProducers {
    pub async fn publish_order_settled(&self, event: OrderSettledEvent) {
        for producer in &self.order_settled_producer {
            trace!("📬️ Publishing settlement of {}", event.transaction.order_no);
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payout_submitted(&self, event: PayoutSubmittedEvent) {
        for producer in &self.payout_submitted_producer {
            trace!("📬️ Publishing submission of {}", event.transaction.order_no);
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_settled: Option<EventHandler<OrderSettledEvent>>,
    pub on_payout_submitted: Option<EventHandler<PayoutSubmittedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_settled = hooks.on_order_settled.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_submitted = hooks.on_payout_submitted.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_settled, on_payout_submitted }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_settled {
            result.order_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_submitted {
            result.payout_submitted_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns one task per registered hook. Each task ends once every producer for it has been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payout_submitted {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_settled: Option<Handler<OrderSettledEvent>>,
    pub on_payout_submitted: Option<Handler<PayoutSubmittedEvent>>,
}

impl EventHooks {
    pub fn on_order_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderSettledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_settled = Some(Arc::new(f));
        self
    }

    pub fn on_payout_submitted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutSubmittedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payout_submitted = Some(Arc::new(f));
        self
    }
}
