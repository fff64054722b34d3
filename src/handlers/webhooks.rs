use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Form,
};
use tracing::warn;

use crate::{errors::ServiceError, services::webhook::GatewayNotification, AppState};

/// The exact acknowledgement body the gateway expects. Any other body, or
/// any non-200 status, counts as delivery failure and triggers a retry.
const ACK_BODY: &str = "OK";

/// Gateway payment notification. Unauthenticated by design; the signature
/// inside the payload is the trust anchor.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = GatewayNotification,
    responses(
        (status = 200, description = "Notification applied; body is the literal ack token"),
        (status = 400, description = "Malformed payload or bad signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    payload: Result<Form<GatewayNotification>, FormRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Form(notification) = payload.map_err(|e| {
        warn!(error = %e, "malformed webhook payload");
        ServiceError::BadRequest(format!("invalid webhook payload: {e}"))
    })?;

    state.services.webhook.process(notification).await?;

    Ok((StatusCode::OK, ACK_BODY))
}
