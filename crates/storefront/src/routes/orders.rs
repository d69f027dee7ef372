//! Order route handlers.
//!
//! Mutations return the updated order document. Listings return the order
//! joined with customer and product display fields.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::instrument;

use qmart_core::{
    Amount, LineItemId, NewLineItem, NewOrder, Order, OrderId, OrderStatus, PaymentMode,
    PaymentStatus, ShippingAddress, UserId,
};

use crate::error::{AppError, Result, ValidatedJson};
use crate::models::OrderView;
use crate::state::AppState;

use super::parse_path_id;

/// Body of `POST /orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<NewLineItem>,
    pub shipping_address: ShippingAddress,
    pub amount: Amount,
    #[serde(default)]
    pub payment_mode: PaymentMode,
}

/// Body of `PUT /orders/{orderId}/status`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// Optional body of the return endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReturnRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Successful single-order response.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub message: &'static str,
    pub order: Order,
}

impl OrderResponse {
    fn new(message: &'static str, order: Order) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            order,
        })
    }
}

/// Response for endpoints that return no document.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Parse an optional JSON body. An empty body yields the default value.
fn optional_body<T>(body: &Bytes) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

/// List every order, newest first.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<OrderView>>> {
    Ok(Json(state.orders().list_all().await?))
}

/// Create an order directly, as an administrator.
#[instrument(skip(state))]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    let order = state
        .orders()
        .create(NewOrder {
            user_id: body.user_id,
            items: body.items,
            shipping_address: body.shipping_address,
            amount: body.amount,
            payment_mode: body.payment_mode,
            payment_status: PaymentStatus::Pending,
            gateway: None,
        })
        .await?;

    Ok((StatusCode::CREATED, OrderResponse::new("Order created", order)))
}

/// List one customer's orders, newest first.
#[instrument(skip(state))]
pub async fn by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderView>>> {
    let user_id: UserId = parse_path_id(&user_id, "user")?;
    Ok(Json(state.orders().list_by_user(&user_id).await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>> {
    let order_id: OrderId = parse_path_id(&order_id, "order")?;
    Ok(Json(state.orders().get(&order_id).await?))
}

#[instrument(skip(state))]
pub async fn set_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    ValidatedJson(body): ValidatedJson<StatusRequest>,
) -> Result<Json<OrderResponse>> {
    let order_id: OrderId = parse_path_id(&order_id, "order")?;
    let order = state.orders().set_status(&order_id, body.status).await?;
    Ok(OrderResponse::new("Order status updated", order))
}

#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let order_id: OrderId = parse_path_id(&order_id, "order")?;
    let order = state.orders().cancel(&order_id).await?;
    Ok(OrderResponse::new("Order cancelled", order))
}

/// Return a whole delivered order.
#[instrument(skip(state, body))]
pub async fn return_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderResponse>> {
    let order_id: OrderId = parse_path_id(&order_id, "order")?;
    let request: ReturnRequest = optional_body(&body)?;
    let order = state
        .orders()
        .return_whole(&order_id, request.reason.as_deref())
        .await?;
    Ok(OrderResponse::new("Order returned", order))
}

/// Return one delivered line item.
#[instrument(skip(state, body))]
pub async fn return_item(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<OrderResponse>> {
    let order_id: OrderId = parse_path_id(&order_id, "order")?;
    let item_id: LineItemId = parse_path_id(&item_id, "item")?;
    let request: ReturnRequest = optional_body(&body)?;
    let order = state
        .orders()
        .return_item(&order_id, &item_id, request.reason.as_deref())
        .await?;
    Ok(OrderResponse::new("Item returned", order))
}

#[instrument(skip(state))]
pub async fn destroy(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let order_id: OrderId = parse_path_id(&order_id, "order")?;
    state.orders().delete(&order_id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Order deleted",
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_default() {
        let request: ReturnRequest = optional_body(&Bytes::new()).unwrap();
        assert!(request.reason.is_none());

        let request: ReturnRequest = optional_body(&Bytes::from_static(b" \n")).unwrap();
        assert!(request.reason.is_none());
    }

    #[test]
    fn test_body_reason_is_read() {
        let request: ReturnRequest =
            optional_body(&Bytes::from_static(br#"{"reason":"Damaged"}"#)).unwrap();
        assert_eq!(request.reason.as_deref(), Some("Damaged"));
    }

    #[test]
    fn test_malformed_body_is_bad_request() {
        let result: Result<ReturnRequest> = optional_body(&Bytes::from_static(b"{\"why\":1}"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<StatusRequest>(r#"{"status":"Lost"}"#).is_err());
        let ok: StatusRequest = serde_json::from_str(r#"{"status":"Shipped"}"#).unwrap();
        assert_eq!(ok.status, OrderStatus::Shipped);
    }
}
