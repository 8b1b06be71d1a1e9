use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AuthUser, Role},
    entities::{product, product_approval, product_variant},
    errors::ServiceError,
    handlers::common::{created, non_negative_amount, not_blank, validate_input},
    services::{
        catalog::{CatalogEntry, NewProduct, ProductChanges, ProductSummary},
        inventory::NewVariant,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200), custom = "not_blank")]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "non_negative_amount")]
    pub price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200), custom = "not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom = "non_negative_amount")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddVariantRequest {
    #[validate(length(min = 1, max = 20), custom = "not_blank")]
    pub size: String,
    #[validate(length(min = 1, max = 50), custom = "not_blank")]
    pub color: String,
    #[validate(length(min = 1, max = 20), custom = "not_blank")]
    pub gender: String,
    #[validate(range(min = 0))]
    pub initial_quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetStockRequest {
    #[validate(range(min = 0))]
    pub quantity: i32,
}

/// `school_id` defaults to the manager's own school.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductApprovalRequest {
    pub school_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50), custom = "not_blank")]
    pub grade: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CatalogQuery {
    /// Required for managers; guardians see their student's grade.
    pub grade: Option<String>,
    /// Required for managers; guardians see their student's gender.
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_stock: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(p: product::Model) -> Self {
        Self {
            id: p.id,
            supplier_id: p.supplier_id,
            name: p.name,
            description: p.description,
            price: p.price,
            active: p.active,
            variant_count: None,
            total_stock: None,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl From<ProductSummary> for ProductResponse {
    fn from(summary: ProductSummary) -> Self {
        let mut response = ProductResponse::from(summary.product);
        response.variant_count = Some(summary.variant_count);
        response.total_stock = Some(summary.total_stock);
        response
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VariantResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: String,
    pub color: String,
    pub gender: String,
    pub stock_quantity: i32,
    /// Set when adding a variant that already existed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,
}

impl From<product_variant::Model> for VariantResponse {
    fn from(v: product_variant::Model) -> Self {
        Self {
            id: v.id,
            product_id: v.product_id,
            size: v.size,
            color: v.color,
            gender: v.gender,
            stock_quantity: v.stock_quantity,
            merged: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub school_id: Uuid,
    pub grade: String,
}

impl From<product_approval::Model> for ApprovalResponse {
    fn from(a: product_approval::Model) -> Self {
        Self {
            id: a.id,
            product_id: a.product_id,
            school_id: a.school_id,
            grade: a.grade,
        }
    }
}

fn approval_school(user: &AuthUser, requested: Option<Uuid>) -> Result<Uuid, ServiceError> {
    requested.or(user.school_id).ok_or_else(|| {
        ServiceError::InvalidInput("school_id is required".to_string())
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    validate_input(&request)?;
    let product = state
        .services
        .catalog
        .create_product(
            &user,
            NewProduct {
                name: request.name,
                description: request.description,
                price: request.price,
            },
        )
        .await?;
    Ok(created(product.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> ApiResult<ProductResponse> {
    validate_input(&request)?;
    let product = state
        .services
        .catalog
        .update_product(
            &user,
            product_id,
            ProductChanges {
                name: request.name,
                description: request.description,
                price: request.price,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(product.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}/active",
    summary = "Activate or deactivate product",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn set_product_active(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<ProductResponse> {
    let product = state
        .services
        .catalog
        .set_product_active(&user, product_id, request.active)
        .await?;
    Ok(Json(ApiResponse::success(product.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/mine",
    summary = "List own products",
    responses(
        (status = 200, description = "Products with variant counts", body = ApiResponse<Vec<ProductResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn list_my_products(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<ProductResponse>> {
    let products = state
        .services
        .catalog
        .list_supplier_products(user.actor_id)
        .await?;
    Ok(Json(ApiResponse::success(
        products.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> ApiResult<ProductResponse> {
    let product = state.services.catalog.get_product(product_id).await?;
    crate::services::inventory::ensure_product_owner(&user, &product)?;
    Ok(Json(ApiResponse::success(product.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/variants",
    summary = "Add variant",
    description = "Adds a size/color/gender variant; an identical existing variant has its stock increased instead",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = AddVariantRequest,
    responses(
        (status = 201, description = "Variant stored", body = ApiResponse<VariantResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn add_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<AddVariantRequest>,
) -> Result<(StatusCode, Json<ApiResponse<VariantResponse>>), ServiceError> {
    validate_input(&request)?;
    let added = state
        .services
        .inventory
        .add_variant(
            &user,
            product_id,
            NewVariant {
                size: request.size,
                color: request.color,
                gender: request.gender,
                initial_quantity: request.initial_quantity,
            },
        )
        .await?;
    let mut response = VariantResponse::from(added.variant);
    response.merged = Some(added.merged);
    Ok(created(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/variants",
    summary = "List variants",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Variants by gender and size", body = ApiResponse<Vec<VariantResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn list_variants(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Vec<VariantResponse>> {
    let product = state.services.catalog.get_product(product_id).await?;
    crate::services::inventory::ensure_product_owner(&user, &product)?;
    let variants = state.services.inventory.list_variants(product_id).await?;
    Ok(Json(ApiResponse::success(
        variants.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/variants/{id}/stock",
    summary = "Set stock",
    description = "Overwrites the stock count of a variant",
    params(("id" = Uuid, Path, description = "Variant ID")),
    request_body = SetStockRequest,
    responses(
        (status = 200, description = "Stock updated", body = ApiResponse<VariantResponse>),
        (status = 400, description = "Negative quantity", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn set_variant_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(variant_id): Path<Uuid>,
    Json(request): Json<SetStockRequest>,
) -> ApiResult<VariantResponse> {
    validate_input(&request)?;
    let variant = state
        .services
        .inventory
        .set_stock(&user, variant_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(variant.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/approvals",
    summary = "Approve product for a grade",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductApprovalRequest,
    responses(
        (status = 200, description = "Approval stored", body = ApiResponse<ApprovalResponse>),
        (status = 400, description = "Supplier not approved for the school", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn approve_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<ProductApprovalRequest>,
) -> ApiResult<ApprovalResponse> {
    validate_input(&request)?;
    let school_id = approval_school(&user, request.school_id)?;
    let approval = state
        .services
        .catalog
        .approve_product(&user, product_id, school_id, &request.grade)
        .await?;
    Ok(Json(ApiResponse::success(approval.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}/approvals",
    summary = "Withdraw product approval",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductApprovalRequest,
    responses(
        (status = 204, description = "Approval removed"),
        (status = 404, description = "No such approval", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn revoke_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<ProductApprovalRequest>,
) -> Result<StatusCode, ServiceError> {
    validate_input(&request)?;
    let school_id = approval_school(&user, request.school_id)?;
    let removed = state
        .services
        .catalog
        .revoke_product(&user, product_id, school_id, &request.grade)
        .await?;
    if !removed {
        return Err(ServiceError::NotFound(format!(
            "Product {} is not approved for grade {}",
            product_id, request.grade
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog",
    summary = "School catalog",
    description = "In-stock products a student can buy. Guardians get their student's catalog; managers pick grade and gender",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Catalog entries by name", body = ApiResponse<Vec<CatalogEntry>>),
        (status = 400, description = "Missing grade or gender", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "catalog"
)]
pub async fn school_catalog(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Vec<CatalogEntry>> {
    let catalog = &state.services.catalog;
    let entries = match user.role {
        Role::Guardian => catalog.catalog_for_guardian(user.actor_id).await?,
        _ => {
            let school_id = user.school_id.ok_or_else(|| {
                ServiceError::Forbidden("Account is not attached to a school".to_string())
            })?;
            let (grade, gender) = query.grade.zip(query.gender).ok_or_else(|| {
                ServiceError::InvalidInput("grade and gender are required".to_string())
            })?;
            catalog.school_catalog(school_id, &grade, &gender).await?
        }
    };
    Ok(Json(ApiResponse::success(entries)))
}
