use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    config::GatewayConfig,
    entities::order::{
        ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus,
        PaymentStatus,
    },
    entities::status_history::ActiveModel as HistoryActiveModel,
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::{LedgerUpsert, PaymentLedgerService},
    signature,
};

/// Gateway status codes. The mapping to domain status is total: anything
/// not recognized fails closed.
pub const STATUS_CODE_SUCCESS: i32 = 2;
pub const STATUS_CODE_PENDING: i32 = 0;

/// The gateway's asynchronous notification, form-encoded over an
/// unauthenticated POST. Signature verification is the only trust anchor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GatewayNotification {
    pub merchant_id: String,
    pub order_id: String,
    pub payment_id: Option<String>,
    /// Amount exactly as formatted by the gateway; hashed as received.
    pub amount: String,
    pub currency: String,
    pub status_code: i32,
    pub signature: String,
    pub method: Option<String>,
    pub message: Option<String>,
}

/// Applies gateway notifications to the order and payment ledger.
///
/// Safe under at-least-once redelivery: replays of a success are no-ops,
/// and a paid order is never walked backward by this path.
#[derive(Clone)]
pub struct WebhookProcessor {
    db: Arc<DbPool>,
    gateway: Option<GatewayConfig>,
    ledger: Arc<PaymentLedgerService>,
    event_sender: EventSender,
}

impl WebhookProcessor {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Option<GatewayConfig>,
        ledger: Arc<PaymentLedgerService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            ledger,
            event_sender,
        }
    }

    /// Processes one notification. Any `Err` surfaces as a non-200 response,
    /// which the gateway interprets as delivery failure and retries.
    #[instrument(skip(self, notification), fields(order_id = %notification.order_id, status_code = notification.status_code))]
    pub async fn process(&self, notification: GatewayNotification) -> Result<(), ServiceError> {
        let gateway = self.gateway.as_ref().ok_or_else(|| {
            error!("webhook received but merchant credentials are not configured");
            ServiceError::ConfigurationError(
                "payment gateway credentials are not configured".to_string(),
            )
        })?;

        // Verify over the values as received on the wire, never re-derived
        // from stored state.
        let verified = signature::verify_notification_signature(
            &notification.merchant_id,
            &notification.order_id,
            &notification.amount,
            &notification.currency,
            notification.status_code,
            &gateway.merchant_secret,
            &notification.signature,
        );
        if !verified {
            warn!(
                order_id = %notification.order_id,
                "webhook signature verification failed, no state touched"
            );
            return Err(ServiceError::AuthenticationFailure(
                "webhook signature verification failed".to_string(),
            ));
        }

        let order_id = Uuid::parse_str(&notification.order_id).map_err(|_| {
            error!(
                order_id = %notification.order_id,
                "ALERT: webhook carries a malformed order id, possible forgery"
            );
            ServiceError::NotFound(format!("Order {} not found", notification.order_id))
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                error!(
                    order_id = %order_id,
                    "ALERT: webhook for unknown order, possible forged or stale notification"
                );
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let incoming = map_status_code(notification.status_code);

        // Monotonic-once-paid: a paid order is never mutated by this path.
        // The ledger still records the gateway's view for the audit trail,
        // and the gateway gets its success ack so it stops redelivering.
        if order.payment_status == PaymentStatus::Paid {
            if incoming == PaymentStatus::Paid {
                info!(order_id = %order_id, "webhook replay for paid order, no-op");
            } else {
                warn!(
                    order_id = %order_id,
                    incoming = %incoming,
                    "webhook attempted to regress a paid order, rejected; ledger audit copy updated"
                );
            }
            self.upsert_ledger(&order, incoming, &notification).await;
            return Ok(());
        }

        let updated = self.apply_to_order(order, incoming.clone(), &notification).await?;

        // Ledger write comes after the order commit: its failure must never
        // roll back or hide the order's new state.
        self.upsert_ledger(&updated, incoming.clone(), &notification).await;

        let event = match incoming {
            PaymentStatus::Paid => Some(Event::PaymentSucceeded(order_id)),
            PaymentStatus::Failed => Some(Event::PaymentFailed(order_id)),
            _ => None,
        };
        if let Some(event) = event {
            if let Err(e) = self.event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "failed to send payment event");
            }
        }

        Ok(())
    }

    async fn apply_to_order(
        &self,
        order: OrderModel,
        incoming: PaymentStatus,
        notification: &GatewayNotification,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db;
        let now = Utc::now();
        let order_id = order.id;
        let current_status = order.order_status.clone();
        let version = order.version;

        let next_order_status = match incoming {
            // Success confirms the order for fulfillment.
            PaymentStatus::Paid if current_status.can_transition_to(&OrderStatus::Confirmed) => {
                OrderStatus::Confirmed
            }
            // Failure auto-cancels unless fulfillment already ended.
            PaymentStatus::Failed if !current_status.is_terminal() => OrderStatus::Cancelled,
            _ => current_status.clone(),
        };

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to start webhook transaction");
            ServiceError::DatabaseError(e)
        })?;

        let mut active: OrderActiveModel = order.into();
        active.payment_status = Set(incoming.clone());
        active.order_status = Set(next_order_status.clone());
        if let Some(payment_id) = &notification.payment_id {
            active.gateway_payment_ref = Set(Some(payment_id.clone()));
        }
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to apply webhook to order");
            ServiceError::DatabaseError(e)
        })?;

        let history = HistoryActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            order_status: Set(next_order_status.clone()),
            payment_status: Set(incoming.clone()),
            actor: Set("gateway:webhook".to_string()),
            note: Set(notification
                .message
                .clone()
                .or_else(|| Some(format!("status_code={}", notification.status_code)))),
            created_at: Set(now),
        };
        history.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to append webhook status history");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit webhook transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            payment_status = %incoming,
            order_status = %next_order_status,
            "webhook applied to order"
        );
        Ok(updated)
    }

    async fn upsert_ledger(
        &self,
        order: &OrderModel,
        status: PaymentStatus,
        notification: &GatewayNotification,
    ) {
        let amount = notification
            .amount
            .parse()
            .unwrap_or(order.total_amount);
        let entry = LedgerUpsert {
            provider: "gateway".to_string(),
            payment_status: status,
            amount,
            currency: notification.currency.clone(),
            provider_payment_id: notification.payment_id.clone(),
            raw_payload: serde_json::to_value(notification).ok(),
        };

        if let Err(e) = self.ledger.upsert(order, entry).await {
            // The order write already stands; flag for reconciliation.
            error!(
                error = %e,
                order_id = %order.id,
                "ledger upsert failed after order update, reconciliation required"
            );
        }
    }
}

/// Total mapping over all gateway status codes: unknown codes fail closed.
pub fn map_status_code(status_code: i32) -> PaymentStatus {
    match status_code {
        STATUS_CODE_SUCCESS => PaymentStatus::Paid,
        STATUS_CODE_PENDING => PaymentStatus::Pending,
        _ => PaymentStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping_is_total_and_fails_closed() {
        assert_eq!(map_status_code(2), PaymentStatus::Paid);
        assert_eq!(map_status_code(0), PaymentStatus::Pending);
        for unknown in [-3, -2, -1, 1, 3, 42, i32::MIN, i32::MAX] {
            assert_eq!(map_status_code(unknown), PaymentStatus::Failed, "{unknown}");
        }
    }
}
