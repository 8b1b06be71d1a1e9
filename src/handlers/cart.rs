use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::validate_input,
    services::cart::{CartLineView, CartSummary, StockShortfall},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,
}

/// A quantity of zero or less removes the line.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCartLineRequest {
    #[validate(range(max = 999))]
    pub quantity: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "Show cart",
    responses(
        (status = 200, description = "Cart lines, newest first", body = ApiResponse<Vec<CartLineView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<CartLineView>> {
    let lines = state.services.cart.list(user.actor_id).await?;
    Ok(Json(ApiResponse::success(lines)))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart",
    summary = "Add to cart",
    description = "Adds units of a product variant; an existing line for the same variant grows instead",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Updated cart", body = ApiResponse<Vec<CartLineView>>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or variant not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<CartLineView>>>), ServiceError> {
    validate_input(&request)?;
    let cart = &state.services.cart;
    cart.add_item(
        user.actor_id,
        request.product_id,
        request.variant_id,
        request.quantity,
    )
    .await?;
    let lines = cart.list(user.actor_id).await?;
    Ok(crate::handlers::common::created(lines))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    summary = "Empty cart",
    responses(
        (status = 204, description = "Cart emptied"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.cart.clear(user.actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/lines/{id}",
    summary = "Change line quantity",
    params(("id" = Uuid, Path, description = "Cart line ID")),
    request_body = UpdateCartLineRequest,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Vec<CartLineView>>),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn update_cart_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path(line_id): Path<Uuid>,
    Json(request): Json<UpdateCartLineRequest>,
) -> ApiResult<Vec<CartLineView>> {
    validate_input(&request)?;
    let cart = &state.services.cart;
    cart.update_quantity(user.actor_id, line_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart.list(user.actor_id).await?)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/lines/{id}",
    summary = "Remove line",
    params(("id" = Uuid, Path, description = "Cart line ID")),
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<Vec<CartLineView>>),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn remove_cart_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path(line_id): Path<Uuid>,
) -> ApiResult<Vec<CartLineView>> {
    let cart = &state.services.cart;
    cart.remove_item(user.actor_id, line_id).await?;
    Ok(Json(ApiResponse::success(cart.list(user.actor_id).await?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/summary",
    summary = "Cart totals",
    responses(
        (status = 200, description = "Item count and total", body = ApiResponse<CartSummary>),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn cart_summary(State(state): State<AppState>, user: AuthUser) -> ApiResult<CartSummary> {
    let summary = state.services.cart.summary(user.actor_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/stock-check",
    summary = "Check cart against stock",
    description = "Lists every line asking for more units than are currently in stock",
    responses(
        (status = 200, description = "Shortfalls; empty when the cart can be ordered", body = ApiResponse<Vec<StockShortfall>>),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn cart_stock_check(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<StockShortfall>> {
    let shortfalls = state.services.cart.validate_stock(user.actor_id).await?;
    Ok(Json(ApiResponse::success(shortfalls)))
}
