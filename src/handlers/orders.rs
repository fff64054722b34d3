use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::{self, OrderStatus, PaymentMethod, PaymentStatus},
    entities::order_item,
    ApiResponse, ApiResult, AppState,
};

/// Order representation returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub order_status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub gateway_payment_ref: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub ship_name: String,
    pub ship_city: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<order::Model> for OrderResponse {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            order_status: model.order_status,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            total_amount: model.total_amount,
            currency: model.currency,
            gateway_payment_ref: model.gateway_payment_ref,
            assigned_to: model.assigned_to,
            ship_name: model.ship_name,
            ship_city: model.ship_city,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_ref: String,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            product_ref: model.product_ref,
            title: model.title,
            unit_price: model.unit_price,
            quantity: model.quantity,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItemsResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

/// The buyer's return-URL polling surface: the gateway redirect lands the
/// browser here before the webhook may have arrived, so callers poll until
/// the payment status settles.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with item snapshot"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderWithItemsResponse> {
    let (order, items) = state.services.checkout.get_order_with_items(id).await?;
    Ok(axum::Json(ApiResponse::success(OrderWithItemsResponse {
        order: order.into(),
        items: items.into_iter().map(Into::into).collect(),
    })))
}
