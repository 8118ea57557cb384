use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventPublisher, Handler, HookDispatcher, OrderPaidEvent, PaymentFailedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventPublisher<OrderPaidEvent>>,
    pub payment_failed_producer: Vec<EventPublisher<PaymentFailedEvent>>,
}

pub struct EventHandlers {
    pub on_order_paid: Option<HookDispatcher<OrderPaidEvent>>,
    pub on_payment_failed: Option<HookDispatcher<PaymentFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_paid = hooks.on_order_paid.map(|f| HookDispatcher::new(buffer_size, f));
        let on_payment_failed = hooks.on_payment_failed.map(|f| HookDispatcher::new(buffer_size, f));
        Self { on_order_paid, on_payment_failed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.publisher());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.publisher());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.run());
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(handler.run());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }
}
