use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    db::DbPool,
    entities::order::{
        ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus,
        PaymentMethod, PaymentStatus,
    },
    entities::status_history::ActiveModel as HistoryActiveModel,
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::{LedgerUpsert, PaymentLedgerService},
};

/// Assignment-scoped fulfillment transitions and COD collection.
///
/// Delivery writers never touch `payment_status` except through the
/// dedicated COD path, which is authenticated by role, not by gateway
/// signature.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DbPool>,
    ledger: Arc<PaymentLedgerService>,
    event_sender: EventSender,
}

impl DeliveryService {
    pub fn new(
        db: Arc<DbPool>,
        ledger: Arc<PaymentLedgerService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            ledger,
            event_sender,
        }
    }

    /// Moves an order through the fulfillment graph. Only the assignee (or
    /// an admin) may transition; `Cancelled` is admin-only.
    #[instrument(skip(self, actor), fields(order_id = %order_id, actor_id = %actor.id, next = %next_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        actor: &AuthUser,
        next_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        actor.require_role(Role::Delivery)?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !actor.is_admin() && order.assigned_to != Some(actor.id) {
            warn!(order_id = %order_id, actor_id = %actor.id, "transition attempt by non-assignee");
            return Err(ServiceError::Forbidden(
                "order is not assigned to this delivery actor".to_string(),
            ));
        }

        if next_status == OrderStatus::Cancelled && !actor.is_admin() {
            return Err(ServiceError::Forbidden(
                "only an admin may cancel an order".to_string(),
            ));
        }

        let current = order.order_status.clone();
        if !current.can_transition_to(&next_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot transition from {} to {}",
                current, next_status
            )));
        }

        let updated = self
            .write_transition(txn, order, next_status.clone(), None, actor.actor_label())
            .await?;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: current,
                new_status: next_status,
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "failed to send status change event");
        }

        Ok(updated)
    }

    /// Assigns an order to a delivery actor (admin action). A pending order
    /// moves to `Assigned`.
    #[instrument(skip(self, admin), fields(order_id = %order_id, assignee = %assignee))]
    pub async fn assign(
        &self,
        order_id: Uuid,
        admin: &AuthUser,
        assignee: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        if !admin.is_admin() {
            return Err(ServiceError::Forbidden(
                "only an admin may assign orders".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.order_status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot assign an order in terminal state {}",
                order.order_status
            )));
        }

        let next_status = if order.order_status == OrderStatus::Pending {
            OrderStatus::Assigned
        } else {
            order.order_status.clone()
        };

        let now = Utc::now();
        let version = order.version;
        let payment_status = order.payment_status.clone();
        let mut active: OrderActiveModel = order.into();
        active.assigned_to = Set(Some(assignee));
        active.order_status = Set(next_status.clone());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        let history = HistoryActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            order_status: Set(next_status),
            payment_status: Set(payment_status),
            actor: Set(admin.actor_label()),
            note: Set(Some(format!("assigned to {}", assignee))),
            created_at: Set(now),
        };
        history.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, assignee = %assignee, "order assigned");
        Ok(updated)
    }

    /// Reconciles a cash-on-delivery collection. Idempotent: re-invoking on
    /// an already-paid COD order is a no-op success.
    #[instrument(skip(self, actor), fields(order_id = %order_id, actor_id = %actor.id))]
    pub async fn mark_cod_collected(
        &self,
        order_id: Uuid,
        actor: &AuthUser,
    ) -> Result<OrderModel, ServiceError> {
        actor.require_role(Role::Delivery)?;

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_method != PaymentMethod::CashOnDelivery {
            return Err(ServiceError::InvalidTransition(
                "cod-collected is only valid for cash-on-delivery orders".to_string(),
            ));
        }

        if order.payment_status == PaymentStatus::Paid {
            info!(order_id = %order_id, "cod already collected, no-op");
            txn.commit().await.map_err(ServiceError::DatabaseError)?;
            return Ok(order);
        }

        let next_status = if order.order_status == OrderStatus::Delivered {
            OrderStatus::Delivered
        } else {
            OrderStatus::Confirmed
        };

        let updated = self
            .write_cod_payment(txn, order, next_status, actor.actor_label())
            .await?;

        let provider_payment_id = match self.ledger.get(order_id).await {
            Ok(Some(entry)) => entry
                .provider_payment_id
                .unwrap_or_else(|| format!("cod-{}", order_id)),
            _ => format!("cod-{}", order_id),
        };

        let entry = LedgerUpsert {
            provider: "cod".to_string(),
            payment_status: PaymentStatus::Paid,
            amount: updated.total_amount,
            currency: updated.currency.clone(),
            provider_payment_id: Some(provider_payment_id),
            raw_payload: None,
        };
        if let Err(e) = self.ledger.upsert(&updated, entry).await {
            error!(
                error = %e,
                order_id = %order_id,
                "ledger upsert failed after cod collection, reconciliation required"
            );
        }

        if let Err(e) = self.event_sender.send(Event::CodCollected(order_id)).await {
            warn!(error = %e, order_id = %order_id, "failed to send cod collected event");
        }

        Ok(updated)
    }

    async fn write_transition(
        &self,
        txn: sea_orm::DatabaseTransaction,
        order: OrderModel,
        next_status: OrderStatus,
        note: Option<String>,
        actor: String,
    ) -> Result<OrderModel, ServiceError> {
        let now = Utc::now();
        let order_id = order.id;
        let version = order.version;
        let payment_status = order.payment_status.clone();

        let mut active: OrderActiveModel = order.into();
        active.order_status = Set(next_status.clone());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        let history = HistoryActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            order_status: Set(next_status),
            payment_status: Set(payment_status),
            actor: Set(actor),
            note: Set(note),
            created_at: Set(now),
        };
        history.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;
        Ok(updated)
    }

    async fn write_cod_payment(
        &self,
        txn: sea_orm::DatabaseTransaction,
        order: OrderModel,
        next_status: OrderStatus,
        actor: String,
    ) -> Result<OrderModel, ServiceError> {
        let now = Utc::now();
        let order_id = order.id;
        let version = order.version;

        let mut active: OrderActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Paid);
        active.order_status = Set(next_status.clone());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to record cod collection");
            ServiceError::DatabaseError(e)
        })?;

        let history = HistoryActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            order_status: Set(next_status),
            payment_status: Set(PaymentStatus::Paid),
            actor: Set(actor),
            note: Set(Some("cash collected on delivery".to_string())),
            created_at: Set(now),
        };
        history.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, "cod collection recorded");
        Ok(updated)
    }
}
