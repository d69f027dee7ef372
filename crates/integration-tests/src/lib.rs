//! Integration test harness for Q-Mart.
//!
//! Builds the real storefront router over in-memory stores, a stub payment
//! gateway and a notifier that records every email instead of sending it.
//! Requests go through `tower::ServiceExt::oneshot`, so the whole HTTP stack
//! (extractors, error mapping, layers) is exercised without a socket.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p qmart-integration-tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

use qmart_core::{Amount, ProductId, UserId};
use qmart_storefront::db::{InMemoryDirectory, InMemoryOrderStore, InMemoryPaymentLedger};
use qmart_storefront::models::{ProductDisplay, UserContact};
use qmart_storefront::services::gateway::{GatewayError, PaymentGateway};
use qmart_storefront::services::notification::{NotificationError, Notifier, OutboundEmail};
use qmart_storefront::services::signature::SignatureVerifier;
use qmart_storefront::state::{AppState, Integrations, Stores};

/// Gateway secret shared by the app under test and the test-side signer.
pub const TEST_SECRET: &str = "q8Zr3LmX2vTn7KpB4wYs9HdC";

/// Seeded customer.
pub const USER_ID: &str = "65a1b2c3d4e5f60718293a4b";
/// Seeded product priced at 250.
pub const PRODUCT_ID: &str = "65a1b2c3d4e5f60718293a4c";

/// Notifier that keeps every email in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingNotifier {
    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotificationError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

/// Gateway that answers order creation locally.
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, amount: Amount) -> Result<Value, GatewayError> {
        Ok(json!({
            "id": "order_stub_1",
            "entity": "order",
            "amount": amount.to_minor_units()?,
            "currency": "INR",
            "status": "created"
        }))
    }
}

/// The router under test plus handles on everything behind it.
pub struct TestApp {
    router: Router,
    pub orders: InMemoryOrderStore,
    pub payments: InMemoryPaymentLedger,
    pub directory: InMemoryDirectory,
    pub notifier: Arc<RecordingNotifier>,
    signer: SignatureVerifier,
}

impl TestApp {
    /// App with a configured gateway, one seeded customer and one product.
    ///
    /// # Panics
    ///
    /// Panics if the seeded ids are malformed.
    #[allow(clippy::unwrap_used)]
    pub async fn new() -> Self {
        let orders = InMemoryOrderStore::new();
        let payments = InMemoryPaymentLedger::new();
        let directory = InMemoryDirectory::new();
        let notifier = Arc::new(RecordingNotifier::default());

        directory
            .insert_user(
                UserId::parse(USER_ID).unwrap(),
                UserContact {
                    name: "Asha Rao".to_string(),
                    email: "asha@example.in".to_string(),
                },
            )
            .await;
        directory
            .insert_product(
                ProductId::parse(PRODUCT_ID).unwrap(),
                ProductDisplay {
                    name: "Filter Coffee 500g".to_string(),
                    price: Amount::new(250.into()).unwrap(),
                    image: None,
                },
            )
            .await;

        let stores = Stores {
            orders: Arc::new(orders.clone()),
            payments: Arc::new(payments.clone()),
            directory: Arc::new(directory.clone()),
            pool: None,
        };
        let integrations = Integrations {
            gateway: Some(Arc::new(StubGateway)),
            verifier: Some(SignatureVerifier::new(SecretString::from(TEST_SECRET))),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
            notification_timeout: Duration::from_secs(2),
        };

        Self {
            router: qmart_storefront::app(AppState::new(stores, integrations)),
            orders,
            payments,
            directory,
            notifier,
            signer: SignatureVerifier::new(SecretString::from(TEST_SECRET)),
        }
    }

    /// The signature the gateway would send for this pair.
    ///
    /// # Panics
    ///
    /// Panics if either reference is empty.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn sign(&self, order_ref: &str, payment_ref: &str) -> String {
        self.signer.sign(order_ref, payment_ref).unwrap()
    }

    /// Send a request and return the status and JSON body (`Null` if empty).
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body is not JSON.
    #[allow(clippy::unwrap_used)]
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, body).await
    }
}

/// A shipping address with every field filled in.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "fullName": "Asha Rao",
        "phone": "9800000000",
        "addressLine": "12 MG Road",
        "city": "Bengaluru",
        "state": "Karnataka",
        "pincode": "560001"
    })
}

/// Cart fields for `quantity` units of the seeded product at 250 each.
#[must_use]
pub fn cart(quantity: u32) -> Value {
    json!({
        "userId": USER_ID,
        "amount": 250 * quantity,
        "items": [{"productId": PRODUCT_ID, "quantity": quantity, "price": 250}],
        "shippingAddress": shipping_address()
    })
}

/// Merge two JSON objects, `extra` winning on conflicts.
#[must_use]
pub fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}
