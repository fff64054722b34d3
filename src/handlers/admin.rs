use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::{OrderStatus, PaymentStatus},
    errors::ServiceError,
    handlers::orders::OrderResponse,
    ApiResponse, ApiResult, AppState,
};

/// Body for a manual payment correction. Both enums are closed; an unknown
/// value is a 400, never a guess.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SetPaymentStatusRequest {
    pub payment_status: PaymentStatus,
    pub order_status: Option<OrderStatus>,
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/payments/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = SetPaymentStatusRequest,
    responses(
        (status = 200, description = "Payment status overridden"),
        (status = 400, description = "Invalid enum value", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn set_payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<SetPaymentStatusRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(request) = payload
        .map_err(|e| ServiceError::InvalidStatus(format!("invalid override payload: {e}")))?;

    let order = state
        .services
        .admin
        .set_payment_status(id, &user, request.payment_status, request.order_status)
        .await?;
    Ok(Json(ApiResponse::success(order.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/payments/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order and payment records deleted"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn delete_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Uuid> {
    state.services.admin.delete_payment(id, &user).await?;
    Ok(Json(ApiResponse::success(id)))
}
