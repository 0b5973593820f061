use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the processor is gone
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

/// Domain events raised by the storefront services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    CartCreated(Uuid),
    CartItemAdded {
        cart_id: Uuid,
        item_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartCleared(Uuid),
    OrderCreated(Uuid),
    CourierRegistered {
        order_id: Uuid,
        tracking_id: String,
    },
    CourierRegistrationPending {
        order_id: Uuid,
        reason: String,
    },
    PaymentRecorded {
        order_id: Uuid,
        payment_id: Uuid,
        transaction_status: String,
    },
    OrderPaid(Uuid),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CartCreated(_) => "cart_created",
            Event::CartItemAdded { .. } => "cart_item_added",
            Event::CartItemUpdated { .. } => "cart_item_updated",
            Event::CartItemRemoved { .. } => "cart_item_removed",
            Event::CartCleared(_) => "cart_cleared",
            Event::OrderCreated(_) => "order_created",
            Event::CourierRegistered { .. } => "courier_registered",
            Event::CourierRegistrationPending { .. } => "courier_registration_pending",
            Event::PaymentRecorded { .. } => "payment_recorded",
            Event::OrderPaid(_) => "order_paid",
        }
    }
}

/// Consumes domain events until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("storefront.events", 1, "event" => event.name());

        match &event {
            Event::OrderCreated(order_id) => {
                counter!("storefront.checkouts.completed", 1);
                info!(%order_id, "order created");
            }
            Event::CourierRegistered {
                order_id,
                tracking_id,
            } => {
                counter!("storefront.courier.registered", 1);
                info!(%order_id, %tracking_id, "courier order registered");
            }
            Event::CourierRegistrationPending { order_id, reason } => {
                counter!("storefront.courier.pending", 1);
                warn!(%order_id, %reason, "courier registration pending");
            }
            Event::PaymentRecorded {
                order_id,
                payment_id,
                transaction_status,
            } => {
                counter!("storefront.payments.recorded", 1);
                info!(%order_id, %payment_id, %transaction_status, "payment notification recorded");
            }
            Event::OrderPaid(order_id) => {
                counter!("storefront.orders.paid", 1);
                info!(%order_id, "order paid");
            }
            other => debug!(event = ?other, "cart event"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::CartCleared(Uuid::nil())).await.is_err());
        sender.send_or_log(Event::CartCleared(Uuid::nil())).await;
    }

    #[tokio::test]
    async fn processor_drains_until_senders_drop() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let worker = tokio::spawn(process_events(rx));

        sender.send(Event::OrderCreated(Uuid::new_v4())).await.unwrap();
        sender.send(Event::OrderPaid(Uuid::new_v4())).await.unwrap();
        drop(sender);

        worker.await.unwrap();
    }
}
