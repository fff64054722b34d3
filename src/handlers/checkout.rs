use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::orders::OrderResponse,
    services::checkout::{CreateOrderRequest, PaymentRequest},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: OrderResponse,
    /// Present for gateway orders only; the buyer's browser posts this to
    /// the gateway redirect. COD orders get a plain confirmation.
    pub payment_request: Option<PaymentRequest>,
}

#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Invalid cart or amount", body = crate::errors::ErrorResponse),
        (status = 500, description = "Gateway credentials missing", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(request) =
        payload.map_err(|e| ServiceError::BadRequest(format!("invalid checkout payload: {e}")))?;

    let (order, payment_request) = state.services.checkout.create_order(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(CheckoutResponse {
            order: order.into(),
            payment_request,
        })),
    ))
}
