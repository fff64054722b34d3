use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::order::{
        ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus,
        PaymentStatus,
    },
    entities::order_item,
    entities::payment,
    entities::status_history::{self, ActiveModel as HistoryActiveModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::{LedgerUpsert, PaymentLedgerService},
};

/// Manual payment correction and deletion, bypassing the gateway.
///
/// This is the designated human-in-the-loop escape hatch: unlike the
/// webhook path it may regress a paid order, so every call is audit-logged
/// with the acting admin's identity.
#[derive(Clone)]
pub struct AdminService {
    db: Arc<DbPool>,
    ledger: Arc<PaymentLedgerService>,
    event_sender: EventSender,
}

impl AdminService {
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

    /// Sets the payment status directly. When no order status is supplied
    /// it defaults from the fixed mapping Paid→Confirmed, Failed→Cancelled,
    /// else Pending.
    #[instrument(skip(self, admin), fields(order_id = %order_id, admin_id = %admin.id, payment_status = %payment_status))]
    pub async fn set_payment_status(
        &self,
        order_id: Uuid,
        admin: &AuthUser,
        payment_status: PaymentStatus,
        order_status: Option<OrderStatus>,
    ) -> Result<OrderModel, ServiceError> {
        if !admin.is_admin() {
            return Err(ServiceError::Forbidden(
                "payment override requires the admin role".to_string(),
            ));
        }

        let next_order_status = order_status.unwrap_or(match payment_status {
            PaymentStatus::Paid => OrderStatus::Confirmed,
            PaymentStatus::Failed => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        });

        let db = &*self.db;
        let now = Utc::now();
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_status == PaymentStatus::Paid && payment_status != PaymentStatus::Paid {
            warn!(
                order_id = %order_id,
                admin_id = %admin.id,
                from = %order.payment_status,
                to = %payment_status,
                "admin override regresses a paid order"
            );
        }

        let version = order.version;
        let mut active: OrderActiveModel = order.into();
        active.payment_status = Set(payment_status.clone());
        active.order_status = Set(next_order_status.clone());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to apply admin payment override");
            ServiceError::DatabaseError(e)
        })?;

        let history = HistoryActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            order_status: Set(next_order_status),
            payment_status: Set(payment_status.clone()),
            actor: Set(admin.actor_label()),
            note: Set(Some("admin payment override".to_string())),
            created_at: Set(now),
        };
        history.insert(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            order_id = %order_id,
            admin_id = %admin.id,
            payment_status = %payment_status,
            "admin payment override applied"
        );

        let entry = LedgerUpsert {
            provider: "admin".to_string(),
            payment_status: payment_status.clone(),
            amount: updated.total_amount,
            currency: updated.currency.clone(),
            provider_payment_id: None,
            raw_payload: None,
        };
        if let Err(e) = self.ledger.upsert(&updated, entry).await {
            error!(
                error = %e,
                order_id = %order_id,
                "ledger upsert failed after admin override, reconciliation required"
            );
        }

        if let Err(e) = self
            .event_sender
            .send(Event::PaymentOverridden {
                order_id,
                admin_id: admin.id,
                payment_status,
            })
            .await
        {
            warn!(error = %e, order_id = %order_id, "failed to send override event");
        }

        Ok(updated)
    }

    /// Permanently removes an order together with its ledger entry, item
    /// snapshot and history. Irreversible.
    #[instrument(skip(self, admin), fields(order_id = %order_id, admin_id = %admin.id))]
    pub async fn delete_payment(&self, order_id: Uuid, admin: &AuthUser) -> Result<(), ServiceError> {
        if !admin.is_admin() {
            return Err(ServiceError::Forbidden(
                "payment deletion requires the admin role".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        payment::Entity::delete_by_id(order_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        status_history::Entity::delete_many()
            .filter(status_history::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        order_item::Entity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        OrderEntity::delete_by_id(order_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(
            order_id = %order_id,
            order_number = %order.order_number,
            admin_id = %admin.id,
            "order and payment records permanently deleted"
        );

        if let Err(e) = self.event_sender.send(Event::OrderDeleted(order_id)).await {
            warn!(error = %e, order_id = %order_id, "failed to send delete event");
        }

        Ok(())
    }
}
