//! Checkout scenarios: gateway payment verification and cash on delivery.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use qmart_core::{PaymentOutcome, PaymentStatus};
use qmart_integration_tests::{TestApp, cart, merge};
use qmart_storefront::db::OrderStore;

fn confirmation(app: &TestApp, order_ref: &str, payment_ref: &str) -> serde_json::Value {
    json!({
        "gatewayOrderRef": order_ref,
        "gatewayPaymentRef": payment_ref,
        "signature": app.sign(order_ref, payment_ref)
    })
}

#[tokio::test]
async fn test_verified_payment_persists_payment_and_order() {
    let app = TestApp::new().await;
    let body = merge(cart(2), confirmation(&app, "order_Nx1", "pay_Nx1"));

    let (status, json) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["success"], true);
    assert_eq!(json["order"]["status"], "Processing");
    assert_eq!(json["order"]["paymentStatus"], "Paid");
    assert_eq!(json["order"]["gatewayOrderRef"], "order_Nx1");
    assert_eq!(json["notification"], "sent");

    let records = app.payments.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, PaymentOutcome::Success);
    assert_eq!(json["paymentId"], records[0].id.as_str());

    let order_id = json["order"]["id"].as_str().unwrap().parse().unwrap();
    let stored = app.orders.get(&order_id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert_eq!(stored.items.len(), 1);

    let sent = app.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "asha@example.in");
    assert_eq!(sent[0].subject, format!("Order Confirmation - {order_id}"));
    assert!(sent[0].text_body.contains("Filter Coffee 500g"));
}

#[tokio::test]
async fn test_tampered_signature_creates_nothing() {
    let app = TestApp::new().await;
    let mut confirmation = confirmation(&app, "order_Nx2", "pay_Nx2");
    let mut signature = confirmation["signature"].as_str().unwrap().to_string();
    let last = if signature.ends_with('0') { "1" } else { "0" };
    signature.replace_range(signature.len() - 1.., last);
    confirmation["signature"] = json!(signature);

    let (status, json) = app
        .post("/api/payment/verify", merge(cart(2), confirmation))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "invalid signature");
    assert!(app.payments.records().await.is_empty());
    assert!(app.orders.is_empty().await);
    assert!(app.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_signature_for_other_payment_is_rejected() {
    let app = TestApp::new().await;
    let mut body = merge(cart(1), confirmation(&app, "order_A", "pay_A"));
    body["gatewayPaymentRef"] = json!("pay_B");

    let (status, _) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.payments.records().await.is_empty());
}

#[tokio::test]
async fn test_missing_gateway_fields_rejected() {
    let app = TestApp::new().await;
    let body = merge(cart(1), json!({"gatewayOrderRef": "order_Nx3"}));

    let (status, json) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "missing payment fields");
    assert!(app.orders.is_empty().await);
}

#[tokio::test]
async fn test_gateway_native_field_names_accepted() {
    let app = TestApp::new().await;
    let body = merge(
        cart(1),
        json!({
            "razorpay_order_id": "order_Nx4",
            "razorpay_payment_id": "pay_Nx4",
            "razorpay_signature": app.sign("order_Nx4", "pay_Nx4"),
            "paymentMode": "UPI"
        }),
    );

    let (status, json) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["order"]["paymentMode"], "Gateway");
}

#[tokio::test]
async fn test_amount_mismatch_rejected_before_any_write() {
    let app = TestApp::new().await;
    let mut body = merge(cart(2), confirmation(&app, "order_Nx5", "pay_Nx5"));
    body["amount"] = json!(499);

    let (status, json) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    assert!(app.payments.records().await.is_empty());
    assert!(app.orders.is_empty().await);
}

#[tokio::test]
async fn test_sub_paisa_price_rejected_before_any_write() {
    let app = TestApp::new().await;
    let mut body = merge(cart(1), confirmation(&app, "order_Nx6", "pay_Nx6"));
    body["items"][0]["price"] = json!("0.125");
    body["amount"] = json!("0.125");

    let (status, json) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    assert_eq!(json["success"], false);
    assert!(app.payments.records().await.is_empty());
    assert!(app.orders.is_empty().await);
}

#[tokio::test]
async fn test_eleven_digit_amount_rejected_before_any_write() {
    let app = TestApp::new().await;
    let mut body = merge(cart(1), confirmation(&app, "order_Nx7", "pay_Nx7"));
    body["items"][0]["price"] = json!(100_000_000_000_u64);
    body["amount"] = json!(100_000_000_000_u64);

    let (status, json) = app.post("/api/payment/verify", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
    assert!(app.payments.records().await.is_empty());
    assert!(app.orders.is_empty().await);

    let (status, _) = app
        .post("/api/payment/create-order", json!({"amount": 100_000_000_000_u64}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = TestApp::new().await;
    let body = merge(cart(1), json!({"userId": "not-a-user"}));

    let (status, json) = app.post("/api/payment/cod", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_cash_on_delivery_skips_verification() {
    let app = TestApp::new().await;

    let (status, json) = app.post("/api/payment/cod", cart(1)).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["order"]["status"], "Processing");
    assert_eq!(json["order"]["paymentStatus"], "Pending");
    assert_eq!(json["order"]["paymentMode"], "CashOnDelivery");
    assert!(json.get("paymentId").is_none());
    assert_eq!(app.orders.len().await, 1);
    assert!(app.payments.records().await.is_empty());
}

#[tokio::test]
async fn test_unknown_customer_skips_notification() {
    let app = TestApp::new().await;
    let mut body = cart(1);
    body["userId"] = json!("65a1b2c3d4e5f60718290000");

    let (status, json) = app.post("/api/payment/cod", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["notification"], "skipped");
    assert!(app.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_create_gateway_order_uses_minor_units() {
    let app = TestApp::new().await;

    let (status, json) = app
        .post("/api/payment/create-order", json!({"amount": 500}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "order_stub_1");
    assert_eq!(json["amount"], 50_000);
}

#[tokio::test]
async fn test_payment_lookup() {
    let app = TestApp::new().await;
    let body = merge(cart(1), confirmation(&app, "order_Nx6", "pay_Nx6"));
    let (_, created) = app.post("/api/payment/verify", body).await;
    let payment_id = created["paymentId"].as_str().unwrap();

    let (status, json) = app.get(&format!("/api/payment/{payment_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["gatewayPaymentRef"], "pay_Nx6");
    assert_eq!(json["outcome"], "success");

    let (status, _) = app.get("/api/payment/65a1b2c3d4e5f60718290000").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/payment/short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
