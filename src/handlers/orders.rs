use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    handlers::common::validate_input,
    services::{
        order_status::parse_status,
        orders::{OrderItemDetail, OrderWithItems, PlaceOrderRequest},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub supplier_id: Uuid,
    pub product_name: String,
    pub supplier_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub gender: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<OrderItemDetail> for OrderItemResponse {
    fn from(detail: OrderItemDetail) -> Self {
        let item = detail.item;
        Self {
            id: item.id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            supplier_id: item.supplier_id,
            product_name: detail.product_name,
            supplier_name: detail.supplier_name,
            size: detail.size,
            color: detail.color,
            gender: detail.gender,
            quantity: item.quantity,
            unit_price: item.unit_price,
            subtotal: item.subtotal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub guardian_id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub total: Decimal,
    pub commission: Decimal,
    pub status: OrderStatus,
    /// Present on single-order responses; empty in listings.
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<order::Model> for OrderResponse {
    fn from(order: order::Model) -> Self {
        Self {
            id: order.id,
            guardian_id: order.guardian_id,
            student_id: order.student_id,
            school_id: order.school_id,
            total: order.total,
            commission: order.commission,
            status: order.status,
            items: Vec::new(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Builds the full response for a single order, item names included.
async fn order_response(
    state: &AppState,
    value: OrderWithItems,
) -> Result<OrderResponse, ServiceError> {
    let items = state.services.orders.describe_items(value.items).await?;
    let mut response = OrderResponse::from(value.order);
    response.items = items.into_iter().map(Into::into).collect();
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Place order",
    description = "Turns the guardian's cart into an order, decrementing stock and emptying the cart in one transaction",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Empty cart or invalid student", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let placed = state.services.orders.place_order(&user, request).await?;
    Ok(crate::handlers::common::created(
        order_response(&state, placed).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Orders visible to the caller, newest first",
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<OrderResponse>> {
    let orders = state.services.orders.list_visible(&user).await?;
    Ok(Json(ApiResponse::success(
        orders.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_order(&user, order_id).await?;
    Ok(Json(ApiResponse::success(order_response(&state, order).await?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/items",
    summary = "Get order items",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Item snapshots", body = ApiResponse<Vec<OrderItemResponse>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order_items(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Vec<OrderItemResponse>> {
    let items = state
        .services
        .orders
        .get_order_items(&user, order_id)
        .await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Moves an order along its lifecycle. Only suppliers with items in the order may do this",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<OrderResponse> {
    validate_input(&request)?;
    let new_status = parse_status(&request.status)?;
    let order = state
        .services
        .order_status
        .transition(&user, order_id, new_status)
        .await?;
    Ok(Json(ApiResponse::success(order.into())))
}
