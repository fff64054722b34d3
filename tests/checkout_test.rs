mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::{response_json, TestApp, MERCHANT_ID, MERCHANT_SECRET};
use storefront_api::auth::Role;
use storefront_api::entities::order::PaymentMethod;
use storefront_api::signature;

fn checkout_body(method: &str, total: &str) -> serde_json::Value {
    json!({
        "items": [
            {
                "product_ref": "sku-tea-500",
                "title": "Ceylon Tea 500g",
                "unit_price": "1250.00",
                "quantity": 2
            }
        ],
        "total_amount": total,
        "payment_method": method,
        "ship_name": "A. Perera",
        "ship_phone": "0771234567",
        "ship_address": "12 Galle Rd",
        "ship_city": "Colombo"
    })
}

#[tokio::test]
async fn gateway_checkout_returns_signed_payment_request() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let token = app.token_for(buyer, Role::Buyer);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body("Gateway", "2500.00")),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    let data = &body["data"];
    assert_eq!(data["order"]["order_status"], "Pending");
    assert_eq!(data["order"]["payment_status"], "Pending");
    assert_eq!(data["order"]["customer_id"], buyer.to_string());

    let pr = &data["payment_request"];
    assert_eq!(pr["merchant_id"], MERCHANT_ID);
    assert_eq!(pr["amount"], "2500.00");
    assert_eq!(pr["currency"], "LKR");
    assert_eq!(pr["sandbox"], true);

    let expected = signature::compute_checkout_signature(
        MERCHANT_ID,
        pr["order_id"].as_str().unwrap(),
        "2500.00",
        "LKR",
        MERCHANT_SECRET,
    );
    assert_eq!(pr["signature"], expected);
}

#[tokio::test]
async fn cod_checkout_carries_no_payment_request() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body("CashOnDelivery", "2500.00")),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert!(body["data"]["payment_request"].is_null());
    assert_eq!(body["data"]["order"]["payment_method"], "CashOnDelivery");
}

#[tokio::test]
async fn checkout_requires_authentication() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body("Gateway", "2500.00")),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    let mut body = checkout_body("Gateway", "2500.00");
    body["items"] = json!([]);
    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(body), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_positive_total_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    for total in ["0.00", "-10.00"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/checkout",
                Some(checkout_body("CashOnDelivery", total)),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "total {total}");
    }
}

#[tokio::test]
async fn unknown_payment_method_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body("Bitcoin", "2500.00")),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gateway_checkout_without_credentials_is_500() {
    let app = TestApp::new_without_gateway().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body("Gateway", "2500.00")),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The body must not leak configuration detail.
    let body = response_json(response).await;
    assert_eq!(body["kind"], "configuration_error");
    assert!(!body["message"].as_str().unwrap().contains("secret"));
}

#[tokio::test]
async fn cod_checkout_works_without_gateway_credentials() {
    let app = TestApp::new_without_gateway().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body("CashOnDelivery", "2500.00")),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn order_lookup_returns_items_snapshot() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let order = app
        .seed_order(buyer, dec!(2500.00), PaymentMethod::CashOnDelivery)
        .await;

    let token = app.token_for(buyer, Role::Buyer);
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["id"], order.id.to_string());
    assert_eq!(body["data"]["order_number"], order.order_number);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["items"][0]["product_ref"], "sku-tea-500");
}

#[tokio::test]
async fn unknown_order_lookup_is_404() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), Role::Buyer);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", Uuid::new_v4()),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
