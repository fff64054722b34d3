//! Storefront order and payment lifecycle API.
//!
//! Checkout, gateway payment webhooks, delivery status transitions and
//! admin payment overrides for a single-merchant storefront.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod services;
pub mod signature;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, patch, post},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

// App state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
    pub auth: Arc<auth::AuthService>,
}

// Common response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/checkout", post(handlers::checkout::create_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/payments/webhook", post(handlers::webhooks::payment_webhook))
        .route(
            "/delivery/orders/:id/status",
            patch(handlers::delivery::update_status),
        )
        .route(
            "/delivery/orders/:id/cod-collected",
            patch(handlers::delivery::cod_collected),
        )
        .route(
            "/delivery/orders/:id/assign",
            patch(handlers::delivery::assign),
        )
        .route(
            "/admin/payments/:id",
            patch(handlers::admin::set_payment_status).delete(handlers::admin::delete_payment),
        )
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    db::ping(&state.db).await?;
    Ok(Json(ApiResponse::success(json!({ "database": "up" }))))
}

/// Builds the full application router. The auth service rides in request
/// extensions so the `AuthUser` extractor stays state-agnostic.
pub fn app_router(state: AppState) -> Router {
    let auth = state.auth.clone();
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .layer(Extension(auth))
}
