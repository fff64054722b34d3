use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fulfillment status of an order.
///
/// Transitions only move forward through the graph in
/// [`OrderStatus::can_transition_to`], or sideways to `Cancelled` from any
/// non-terminal state (admin action only; enforced by the delivery service).
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "Confirmed")]
    Confirmed,
    #[sea_orm(string_value = "Processing")]
    Processing,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "OutForDelivery")]
    OutForDelivery,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Closed transition graph. Self-transitions are rejected; payment-level
    /// idempotency handles webhook redelivery, not status no-ops.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Assigned) => true,
            (Pending, Confirmed) | (Pending, Processing) => true,
            (Assigned, Confirmed) | (Assigned, Processing) => true,
            (Confirmed, Processing) | (Confirmed, Shipped) => true,
            (Processing, Shipped) => true,
            (Shipped, OutForDelivery) => true,
            (OutForDelivery, Delivered) => true,
            (_, Cancelled) => !self.is_terminal(),
            _ => false,
        }
    }
}

/// How the buyer pays. Immutable after creation.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "Gateway")]
    Gateway,
    #[sea_orm(string_value = "CashOnDelivery")]
    CashOnDelivery,
}

/// Payment state of an order. `Paid` is monotonic for automated writers:
/// only the admin override may move away from it.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Paid")]
    Paid,
    #[sea_orm(string_value = "Failed")]
    Failed,
    #[sea_orm(string_value = "Refunded")]
    Refunded,
}

/// The `orders` table: the buyer's purchase intent plus its fulfillment and
/// payment state. Item and address data are snapshots captured at checkout
/// and never re-read from the catalog afterwards.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-facing unique order number.
    #[sea_orm(unique)]
    pub order_number: String,

    /// Buyer identity from the session token.
    pub customer_id: Uuid,

    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,

    /// Fixed at creation; totals are immutable once paid.
    pub total_amount: Decimal,
    pub currency: String,

    /// External reference reported by the gateway; empty until then.
    pub gateway_payment_ref: Option<String>,

    /// Delivery-role identity this order is assigned to, if any.
    pub assigned_to: Option<Uuid>,

    // Shipping/contact snapshot captured at checkout.
    pub ship_name: String,
    pub ship_phone: String,
    pub ship_address: String,
    pub ship_city: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_one = "super::payment::Entity")]
    Payment,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::OrderStatus::{self, *};
    use sea_orm::Iterable;

    #[test]
    fn transition_graph_is_closed() {
        let allowed: &[(OrderStatus, OrderStatus)] = &[
            (Pending, Assigned),
            (Pending, Confirmed),
            (Pending, Processing),
            (Pending, Cancelled),
            (Assigned, Confirmed),
            (Assigned, Processing),
            (Assigned, Cancelled),
            (Confirmed, Processing),
            (Confirmed, Shipped),
            (Confirmed, Cancelled),
            (Processing, Shipped),
            (Processing, Cancelled),
            (Shipped, OutForDelivery),
            (Shipped, Cancelled),
            (OutForDelivery, Delivered),
            (OutForDelivery, Cancelled),
        ];

        for from in OrderStatus::iter() {
            for to in OrderStatus::iter() {
                let expected = allowed.contains(&(from.clone(), to.clone()));
                assert_eq!(
                    from.can_transition_to(&to),
                    expected,
                    "{from} -> {to} should be {expected}"
                );
            }
        }
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for from in [Delivered, Cancelled] {
            for to in OrderStatus::iter() {
                assert!(!from.can_transition_to(&to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!Delivered.can_transition_to(&Shipped));
        assert!(!Shipped.can_transition_to(&Confirmed));
        assert!(!Confirmed.can_transition_to(&Pending));
        assert!(!OutForDelivery.can_transition_to(&Shipped));
    }

    #[test]
    fn status_enums_resolve_as_api_schemas() {
        use utoipa::PartialSchema;

        // Every DTO that embeds these enums relies on them being schema
        // components.
        let _ = super::OrderStatus::schema();
        let _ = super::PaymentMethod::schema();
        let _ = super::PaymentStatus::schema();
    }
}
