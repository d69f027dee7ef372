//! Order management scenarios: status updates, cancellation and returns.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use qmart_integration_tests::{PRODUCT_ID, TestApp, USER_ID, cart, shipping_address};

/// Place a cash-on-delivery order and return its JSON document.
async fn place_order(app: &TestApp, body: Value) -> Value {
    let (status, json) = app.post("/api/payment/cod", body).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["order"].clone()
}

fn two_line_cart() -> Value {
    json!({
        "userId": USER_ID,
        "amount": 750,
        "items": [
            {"productId": PRODUCT_ID, "quantity": 1, "price": 250},
            {"productId": PRODUCT_ID, "quantity": 2, "price": 250}
        ],
        "shippingAddress": shipping_address()
    })
}

fn id_of(value: &Value) -> &str {
    value["id"].as_str().unwrap()
}

#[tokio::test]
async fn test_return_of_pending_item_is_refused() {
    let app = TestApp::new().await;
    let order = place_order(&app, cart(1)).await;
    let order_id = id_of(&order);
    let item_id = id_of(&order["items"][0]);

    let (status, json) = app
        .post(
            &format!("/orders/{order_id}/items/{item_id}/return"),
            json!({"reason": "Changed my mind"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Only delivered items can be returned");

    let (_, current) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(current["version"], order["version"]);
    assert_eq!(current["items"][0]["status"], "Pending");
    assert!(current["items"][0].get("returnReason").is_none());
}

#[tokio::test]
async fn test_cancel_then_cancel_again() {
    let app = TestApp::new().await;
    let order = place_order(&app, cart(1)).await;
    let uri = format!("/orders/{}/cancel", id_of(&order));

    let (status, json) = app.put(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["order"]["status"], "Cancelled");

    // Repeated cancellation fails the same way every time.
    for _ in 0..2 {
        let (status, json) = app.put(&uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Order is already cancelled");
    }
}

#[tokio::test]
async fn test_delivered_order_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let order = place_order(&app, cart(1)).await;
    let order_id = id_of(&order);

    let (status, _) = app
        .put(&format!("/orders/{order_id}/status"), Some(json!({"status": "Delivered"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.put(&format!("/orders/{order_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Delivered orders cannot be cancelled");

    let (_, current) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(current["status"], "Delivered");
}

#[tokio::test]
async fn test_item_returns_roll_up_to_order() {
    let app = TestApp::new().await;
    let order = place_order(&app, two_line_cart()).await;
    let order_id = id_of(&order);
    let first = id_of(&order["items"][0]).to_string();
    let second = id_of(&order["items"][1]).to_string();

    let (status, delivered) = app
        .put(&format!("/orders/{order_id}/status"), Some(json!({"status": "Delivered"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["order"]["items"][0]["status"], "Delivered");
    assert_eq!(delivered["order"]["items"][1]["status"], "Delivered");

    let (status, json) = app
        .post(
            &format!("/orders/{order_id}/items/{first}/return"),
            json!({"reason": "Damaged"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["order"]["items"][0]["status"], "Returned");
    assert_eq!(json["order"]["items"][0]["returnReason"], "Damaged");
    assert_eq!(json["order"]["status"], "Delivered");

    let (status, json) = app
        .send(
            Method::POST,
            &format!("/orders/{order_id}/items/{second}/return"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["order"]["items"][1]["returnReason"], "Not specified");
    assert_eq!(json["order"]["status"], "Returned");
}

#[tokio::test]
async fn test_whole_order_return() {
    let app = TestApp::new().await;
    let order = place_order(&app, two_line_cart()).await;
    let order_id = id_of(&order);

    let (status, json) = app
        .send(Method::POST, &format!("/orders/{order_id}/return"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Only delivered orders can be returned");

    app.put(&format!("/orders/{order_id}/status"), Some(json!({"status": "Delivered"})))
        .await;
    let (status, json) = app
        .post(&format!("/orders/{order_id}/return"), json!({"reason": "Wrong size"}))
        .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["order"]["status"], "Returned");
    for item in json["order"]["items"].as_array().unwrap() {
        assert_eq!(item["status"], "Returned");
        assert_eq!(item["returnReason"], "Wrong size");
    }
}

#[tokio::test]
async fn test_unknown_item_and_order() {
    let app = TestApp::new().await;
    let order = place_order(&app, cart(1)).await;
    let order_id = id_of(&order);
    let missing = "65a1b2c3d4e5f60718290000";

    let (status, _) = app
        .post(&format!("/orders/{order_id}/items/{missing}/return"), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app.put(&format!("/orders/{missing}/cancel"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Order not found");
}

#[tokio::test]
async fn test_unknown_status_is_rejected() {
    let app = TestApp::new().await;
    let order = place_order(&app, cart(1)).await;

    let (status, _) = app
        .put(&format!("/orders/{}/status", id_of(&order)), Some(json!({"status": "Lost"})))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_listings_and_user_id_shape() {
    let app = TestApp::new().await;
    place_order(&app, cart(1)).await;
    place_order(&app, cart(2)).await;

    let (status, all) = app.get("/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, mine) = app.get(&format!("/orders/user/{USER_ID}")).await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert_eq!(mine[0]["user"]["name"], "Asha Rao");
    assert_eq!(mine[0]["products"][PRODUCT_ID]["name"], "Filter Coffee 500g");

    let (status, _) = app.get("/orders/user/65a1b2c3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/orders/user/zza1b2c3d4e5f60718293a4b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_direct_creation_and_delete() {
    let app = TestApp::new().await;

    let (status, json) = app.post("/orders", cart(3)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["order"]["paymentStatus"], "Pending");
    assert_eq!(json["order"]["paymentMode"], "Other");
    let order_id = id_of(&json["order"]).to_string();

    let (status, _) = app
        .send(Method::DELETE, &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::DELETE, &format!("/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_order_is_rejected() {
    let app = TestApp::new().await;
    let mut body = cart(1);
    body["items"] = json!([]);
    body["amount"] = json!(0);

    let (status, json) = app.post("/orders", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(app.orders.is_empty().await);
}
