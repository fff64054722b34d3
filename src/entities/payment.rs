use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::PaymentStatus;

/// The `payments` table: the payment ledger, keyed 1:1 by order.
///
/// This is the audit/reporting surface of what the gateway (or the COD
/// collection path) last reported; the order's own `payment_status` stays
/// the source of truth for fulfillment decisions. Upsert semantics: a
/// re-notification updates in place, never duplicates.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: Uuid,

    /// "gateway", "cod" or "admin".
    pub provider: String,

    pub payment_status: PaymentStatus,

    /// Must equal the order's total at write time; a mismatch is logged as
    /// an integrity warning and flagged for reconciliation, never silently
    /// accepted.
    pub amount: Decimal,
    pub currency: String,

    pub provider_payment_id: Option<String>,

    /// Opaque audit copy of the last notification payload.
    pub raw_payload: Option<Json>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
