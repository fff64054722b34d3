use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::order::{OrderStatus, PaymentStatus};

/// Events emitted by the order/payment lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),
    CodCollected(Uuid),
    PaymentOverridden {
        order_id: Uuid,
        admin_id: Uuid,
        payment_status: PaymentStatus,
    },
    OrderDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Failure to enqueue is reported to the
    /// caller but must never fail the primary transaction.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Best-effort fan-out seam for push/email delivery (external collaborators).
/// Implementations report failure explicitly; the event loop logs it and
/// moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), NotifyError>;
}

/// Default notifier: structured log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        debug!(?event, "notification dispatched");
        Ok(())
    }
}

/// Background loop draining the event channel. Runs until every sender is
/// dropped; nothing here needs cancellation.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(id) => info!(order_id = %id, "order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(order_id = %order_id, from = %old_status, to = %new_status, "order status changed"),
            Event::PaymentSucceeded(id) => info!(order_id = %id, "payment succeeded"),
            Event::PaymentFailed(id) => info!(order_id = %id, "payment failed"),
            Event::CodCollected(id) => info!(order_id = %id, "cod collected"),
            Event::PaymentOverridden {
                order_id,
                admin_id,
                payment_status,
            } => info!(order_id = %order_id, admin_id = %admin_id, status = %payment_status, "payment overridden by admin"),
            Event::OrderDeleted(id) => info!(order_id = %id, "order deleted"),
        }

        if let Err(e) = notifier.notify(&event).await {
            warn!(error = %e, ?event, "notification delivery failed");
        }
    }
}
