// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_api::{
    auth::{AuthService, AuthUser, Role},
    config::{AppConfig, GatewayConfig, GatewayMode},
    db,
    entities::order::{self, PaymentMethod},
    events::{self, EventSender, LogNotifier},
    services::checkout::{CartItemInput, CreateOrderRequest},
    services::AppServices,
    signature, AppState,
};

pub const MERCHANT_ID: &str = "M100200";
pub const MERCHANT_SECRET: &str = "test-merchant-secret";

/// Helper harness spinning up the full router over an in-memory SQLite
/// database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::build(test_config()).await
    }

    /// A COD-only deployment: no gateway credentials configured.
    pub async fn new_without_gateway() -> Self {
        let mut cfg = test_config();
        cfg.gateway = None;
        Self::build(cfg).await
    }

    async fn build(cfg: AppConfig) -> Self {

        // A single pooled connection keeps the in-memory database alive and
        // shared for the lifetime of the test.
        let db_cfg = db::DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx, Arc::new(LogNotifier)));

        let services = AppServices::new(db_arc.clone(), &cfg, event_sender.clone());
        let auth = Arc::new(AuthService::new(&cfg.jwt_secret));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            auth,
        };

        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Issue a bearer token for the given user id and role.
    pub fn token_for(&self, user_id: Uuid, role: Role) -> String {
        self.state
            .auth
            .issue_token(user_id, role)
            .expect("issue test token")
    }

    /// Send a JSON request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a form-encoded POST, the shape gateway webhooks arrive in.
    pub async fn post_form(&self, uri: &str, fields: &[(&str, String)]) -> axum::response::Response {
        let encoded = serde_urlencoded::to_string(fields).expect("failed to encode form body");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(encoded))
            .expect("failed to build form request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook request")
    }

    /// Seed an order through the checkout service, bypassing HTTP.
    pub async fn seed_order(
        &self,
        customer_id: Uuid,
        total: Decimal,
        method: PaymentMethod,
    ) -> order::Model {
        let customer = AuthUser {
            id: customer_id,
            role: Role::Buyer,
        };
        let request = CreateOrderRequest {
            items: vec![CartItemInput {
                product_ref: "sku-tea-500".into(),
                title: "Ceylon Tea 500g".into(),
                unit_price: total,
                quantity: 1,
            }],
            total_amount: total,
            payment_method: method,
            ship_name: "A. Perera".into(),
            ship_phone: "0771234567".into(),
            ship_address: "12 Galle Rd".into(),
            ship_city: "Colombo".into(),
        };
        let (order, _) = self
            .state
            .services
            .checkout
            .create_order(&customer, request)
            .await
            .expect("seed order for tests");
        order
    }

    /// Fetch an order through the delivery-agnostic service layer.
    pub async fn fetch_order(&self, order_id: Uuid) -> order::Model {
        let (order, _) = self
            .state
            .services
            .checkout
            .get_order_with_items(order_id)
            .await
            .expect("fetch seeded order");
        order
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".into(),
        host: "127.0.0.1".into(),
        port: 18080,
        environment: "test".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: true,
        currency: "LKR".into(),
        cors_allowed_origins: None,
        gateway: Some(GatewayConfig {
            merchant_id: MERCHANT_ID.into(),
            merchant_secret: MERCHANT_SECRET.into(),
            mode: GatewayMode::Sandbox,
            return_url: "https://shop.example/return".into(),
            cancel_url: "https://shop.example/cancel".into(),
            notify_url: "https://shop.example/api/v1/payments/webhook".into(),
        }),
    }
}

/// Build the form fields of a correctly signed gateway notification.
pub fn signed_notification(
    order_id: Uuid,
    amount: &str,
    status_code: i32,
    payment_id: Option<&str>,
) -> Vec<(&'static str, String)> {
    let order_id = order_id.to_string();
    let sig = signature::compute_notification_signature(
        MERCHANT_ID,
        &order_id,
        amount,
        "LKR",
        status_code,
        MERCHANT_SECRET,
    );

    let mut fields = vec![
        ("merchant_id", MERCHANT_ID.to_string()),
        ("order_id", order_id),
        ("amount", amount.to_string()),
        ("currency", "LKR".to_string()),
        ("status_code", status_code.to_string()),
        ("signature", sig),
    ];
    if let Some(pid) = payment_id {
        fields.push(("payment_id", pid.to_string()));
    }
    fields
}

/// Collect a response body into JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body is not valid json")
}

/// Collect a response body into a plain string.
pub async fn response_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read response body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("response body is not utf-8")
}

pub fn assert_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}
