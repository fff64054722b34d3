use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::order::{self, PaymentStatus},
    entities::payment::{
        ActiveModel as PaymentActiveModel, Entity as PaymentEntity, Model as PaymentModel,
    },
    errors::ServiceError,
};

/// One upsert into the payment ledger.
#[derive(Debug, Clone)]
pub struct LedgerUpsert {
    pub provider: String,
    pub payment_status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub provider_payment_id: Option<String>,
    pub raw_payload: Option<serde_json::Value>,
}

/// Append/upsert store of payment attempts, one row per order.
///
/// Every writer that changes payment state keeps this in sync; the order's
/// own `payment_status` remains the source of truth for fulfillment.
#[derive(Clone)]
pub struct PaymentLedgerService {
    db: Arc<DbPool>,
}

impl PaymentLedgerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Upserts the ledger row for an order. A re-notification updates in
    /// place; there is never more than one row per order.
    ///
    /// An amount that disagrees with the order total is a data-integrity
    /// problem: it is logged for reconciliation but does not block the
    /// write, because the notification is still the gateway's authoritative
    /// view of what it charged.
    #[instrument(skip(self, entry), fields(order_id = %order.id, provider = %entry.provider))]
    pub async fn upsert(
        &self,
        order: &order::Model,
        entry: LedgerUpsert,
    ) -> Result<PaymentModel, ServiceError> {
        if entry.amount != order.total_amount {
            warn!(
                order_id = %order.id,
                ledger_amount = %entry.amount,
                order_amount = %order.total_amount,
                "integrity warning: ledger amount differs from order total, flagged for reconciliation"
            );
        }

        let db = &*self.db;
        let now = Utc::now();

        let existing = PaymentEntity::find_by_id(order.id).one(db).await.map_err(|e| {
            error!(error = %e, order_id = %order.id, "failed to read payment ledger");
            ServiceError::DatabaseError(e)
        })?;

        let model = match existing {
            Some(current) => {
                // Keep an already-recorded provider payment id when the new
                // notification carries none.
                let provider_payment_id = entry
                    .provider_payment_id
                    .or(current.provider_payment_id.clone());

                let mut active: PaymentActiveModel = current.into();
                active.provider = Set(entry.provider);
                active.payment_status = Set(entry.payment_status);
                active.amount = Set(entry.amount);
                active.currency = Set(entry.currency);
                active.provider_payment_id = Set(provider_payment_id);
                if entry.raw_payload.is_some() {
                    active.raw_payload = Set(entry.raw_payload);
                }
                active.updated_at = Set(now);
                active.update(db).await.map_err(|e| {
                    error!(error = %e, order_id = %order.id, "failed to update payment ledger");
                    ServiceError::DatabaseError(e)
                })?
            }
            None => {
                let active = PaymentActiveModel {
                    order_id: Set(order.id),
                    provider: Set(entry.provider),
                    payment_status: Set(entry.payment_status),
                    amount: Set(entry.amount),
                    currency: Set(entry.currency),
                    provider_payment_id: Set(entry.provider_payment_id),
                    raw_payload: Set(entry.raw_payload),
                    updated_at: Set(now),
                };
                active.insert(db).await.map_err(|e| {
                    error!(error = %e, order_id = %order.id, "failed to insert payment ledger entry");
                    ServiceError::DatabaseError(e)
                })?
            }
        };

        info!(order_id = %order.id, status = %model.payment_status, "payment ledger upserted");
        Ok(model)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Option<PaymentModel>, ServiceError> {
        PaymentEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
