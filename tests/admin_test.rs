mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

use common::{response_json, TestApp};
use storefront_api::auth::Role;
use storefront_api::entities::order::{OrderStatus, PaymentMethod, PaymentStatus};

fn payments_uri(order_id: Uuid) -> String {
    format!("/api/v1/admin/payments/{}", order_id)
}

#[tokio::test]
async fn admin_override_marks_order_paid_with_default_mapping() {
    let app = TestApp::new().await;
    let order = app
        .seed_order(Uuid::new_v4(), dec!(3200.00), PaymentMethod::Gateway)
        .await;
    let token = app.token_for(Uuid::new_v4(), Role::Admin);

    let response = app
        .request(
            Method::PATCH,
            &payments_uri(order.id),
            Some(json!({ "payment_status": "Paid" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = app.fetch_order(order.id).await;
    assert_eq!(updated.payment_status, PaymentStatus::Paid);
    assert_eq!(updated.order_status, OrderStatus::Confirmed);

    let ledger = app
        .state
        .services
        .ledger
        .get(order.id)
        .await
        .unwrap()
        .expect("ledger row written");
    assert_eq!(ledger.provider, "admin");
    assert_eq!(ledger.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn admin_override_failed_cancels_by_default() {
    let app = TestApp::new().await;
    let order = app
        .seed_order(Uuid::new_v4(), dec!(3200.00), PaymentMethod::Gateway)
        .await;
    let token = app.token_for(Uuid::new_v4(), Role::Admin);

    let response = app
        .request(
            Method::PATCH,
            &payments_uri(order.id),
            Some(json!({ "payment_status": "Failed" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = app.fetch_order(order.id).await;
    assert_eq!(updated.payment_status, PaymentStatus::Failed);
    assert_eq!(updated.order_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn admin_override_may_regress_a_paid_order() {
    let app = TestApp::new().await;
    let order = app
        .seed_order(Uuid::new_v4(), dec!(3200.00), PaymentMethod::Gateway)
        .await;
    let admin = Uuid::new_v4();
    let token = app.token_for(admin, Role::Admin);

    let paid = app
        .request(
            Method::PATCH,
            &payments_uri(order.id),
            Some(json!({ "payment_status": "Paid" })),
            Some(&token),
        )
        .await;
    assert_eq!(paid.status(), StatusCode::OK);

    // The webhook path refuses this; the manual override is the designated
    // escape hatch for refunds and charge disputes.
    let response = app
        .request(
            Method::PATCH,
            &payments_uri(order.id),
            Some(json!({ "payment_status": "Refunded", "order_status": "Cancelled" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["payment_status"], "Refunded");
    assert_eq!(body["data"]["order_status"], "Cancelled");
}

#[tokio::test]
async fn override_requires_admin_role() {
    let app = TestApp::new().await;
    let order = app
        .seed_order(Uuid::new_v4(), dec!(3200.00), PaymentMethod::Gateway)
        .await;

    for role in [Role::Buyer, Role::Delivery] {
        let token = app.token_for(Uuid::new_v4(), role);
        let response = app
            .request(
                Method::PATCH,
                &payments_uri(order.id),
                Some(json!({ "payment_status": "Paid" })),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn unknown_payment_status_value_is_400() {
    let app = TestApp::new().await;
    let order = app
        .seed_order(Uuid::new_v4(), dec!(3200.00), PaymentMethod::Gateway)
        .await;
    let token = app.token_for(Uuid::new_v4(), Role::Admin);

    let response = app
        .request(
            Method::PATCH,
            &payments_uri(order.id),
            Some(json!({ "payment_status": "Settled" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_deletes_order_and_payment_records() {
    let app = TestApp::new().await;
    let buyer = Uuid::new_v4();
    let order = app
        .seed_order(buyer, dec!(3200.00), PaymentMethod::Gateway)
        .await;
    let token = app.token_for(Uuid::new_v4(), Role::Admin);

    let response = app
        .request(Method::DELETE, &payments_uri(order.id), None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let lookup_token = app.token_for(buyer, Role::Buyer);
    let lookup = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.id),
            None,
            Some(&lookup_token),
        )
        .await;
    assert_eq!(lookup.status(), StatusCode::NOT_FOUND);
    assert!(app
        .state
        .services
        .ledger
        .get(order.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn deletion_requires_admin_role() {
    let app = TestApp::new().await;
    let order = app
        .seed_order(Uuid::new_v4(), dec!(3200.00), PaymentMethod::Gateway)
        .await;
    let token = app.token_for(Uuid::new_v4(), Role::Delivery);

    let response = app
        .request(Method::DELETE, &payments_uri(order.id), None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_an_unknown_order_is_404() {
    let app = TestApp::new().await;
    let token = app.token_for(Uuid::new_v4(), Role::Admin);

    let response = app
        .request(
            Method::DELETE,
            &payments_uri(Uuid::new_v4()),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
