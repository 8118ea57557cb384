//! Delivers payment events to the hook registered for them.
//!
//! Payment flows only wait for an event to be queued. Each queued event runs its hook on its own task, tracked in a
//! [`JoinSet`] so that a hook which panics is logged rather than lost, and so that shutting down waits for the hooks
//! that are still running.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

use crate::db_types::OrderId;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Something that happened to the payment for an order.
pub trait PaymentEvent: Send + Sync + 'static {
    /// Used in log messages.
    const NAME: &'static str;

    fn order_id(&self) -> &OrderId;
}

pub struct HookDispatcher<E: PaymentEvent> {
    queue: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    hook: Handler<E>,
}

impl<E: PaymentEvent> HookDispatcher<E> {
    pub fn new(buffer_size: usize, hook: Handler<E>) -> Self {
        let (sender, queue) = mpsc::channel(buffer_size);
        Self { queue, sender, hook }
    }

    pub fn publisher(&self) -> EventPublisher<E> {
        EventPublisher { sender: self.sender.clone() }
    }

    /// Runs the hook for every published event until all publishers have been dropped, then waits for the hooks that
    /// are still running. Returns the number of events dispatched.
    pub async fn run(self) -> usize {
        let Self { mut queue, sender, hook } = self;
        // From here on, only publishers keep the queue open
        drop(sender);
        debug!("📬️ Dispatching {} events", E::NAME);
        let mut running = JoinSet::new();
        let mut dispatched = 0usize;
        loop {
            tokio::select! {
                Some(event) = queue.recv() => {
                    let order_id = event.order_id().clone();
                    trace!("📬️ Running {} hook for order {order_id}", E::NAME);
                    let hook = Arc::clone(&hook);
                    running.spawn(async move {
                        (hook)(event).await;
                        order_id
                    });
                    dispatched += 1;
                },
                Some(finished) = running.join_next(), if !running.is_empty() => {
                    match finished {
                        Ok(order_id) => trace!("📬️ {} hook for order {order_id} finished", E::NAME),
                        Err(e) => error!("📬️ A {} hook did not finish. {e}", E::NAME),
                    }
                },
                else => break,
            }
        }
        debug!("📬️ {} dispatcher has shut down after {dispatched} events", E::NAME);
        dispatched
    }
}

#[derive(Clone)]
pub struct EventPublisher<E: PaymentEvent> {
    sender: mpsc::Sender<E>,
}

impl<E: PaymentEvent> EventPublisher<E> {
    pub async fn publish(&self, event: E) {
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event).await {
            let order_id = event.order_id();
            error!("📬️ No {} hook is running any more. The event for order {order_id} was dropped.", E::NAME);
        }
    }
}
