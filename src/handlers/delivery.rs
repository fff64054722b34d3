use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::OrderStatus,
    errors::ServiceError,
    handlers::orders::OrderResponse,
    ApiResponse, ApiResult, AppState,
};

/// Body for a delivery status transition. The status is a closed enum:
/// unknown values are rejected at deserialization, never coerced.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignRequest {
    pub assignee: Uuid,
}

#[utoipa::path(
    patch,
    path = "/api/v1/delivery/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid enum or transition", body = crate::errors::ErrorResponse),
        (status = 403, description = "Caller is not the assignee", body = crate::errors::ErrorResponse)
    ),
    tag = "Delivery"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(request) = payload
        .map_err(|e| ServiceError::InvalidStatus(format!("invalid status payload: {e}")))?;

    let order = state
        .services
        .delivery
        .update_status(id, &user, request.status)
        .await?;
    Ok(Json(ApiResponse::success(order.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/delivery/orders/{id}/cod-collected",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Collection recorded (idempotent)"),
        (status = 400, description = "Order is not cash-on-delivery", body = crate::errors::ErrorResponse)
    ),
    tag = "Delivery"
)]
pub async fn cod_collected(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state.services.delivery.mark_cod_collected(id, &user).await?;
    Ok(Json(ApiResponse::success(order.into())))
}

#[utoipa::path(
    patch,
    path = "/api/v1/delivery/orders/{id}/assign",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Order assigned"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "Delivery"
)]
pub async fn assign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(request) =
        payload.map_err(|e| ServiceError::BadRequest(format!("invalid assign payload: {e}")))?;

    let order = state
        .services
        .delivery
        .assign(id, &user, request.assignee)
        .await?;
    Ok(Json(ApiResponse::success(order.into())))
}
