use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{homologation, supplier},
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HomologationResponse {
    pub id: Uuid,
    pub school_id: Uuid,
    pub supplier_id: Uuid,
    pub active: bool,
    pub approved_at: DateTime<Utc>,
}

impl From<homologation::Model> for HomologationResponse {
    fn from(h: homologation::Model) -> Self {
        Self {
            id: h.id,
            school_id: h.school_id,
            supplier_id: h.supplier_id,
            active: h.active,
            approved_at: h.approved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SupplierResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<supplier::Model> for SupplierResponse {
    fn from(s: supplier::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            phone: s.phone,
        }
    }
}

fn ensure_school_access(user: &AuthUser, school_id: Uuid) -> Result<(), ServiceError> {
    if user.can_manage_school(school_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Not allowed to view school {}",
            school_id
        )))
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/schools/{id}/suppliers/{supplier_id}",
    summary = "Approve supplier for school",
    params(
        ("id" = Uuid, Path, description = "School ID"),
        ("supplier_id" = Uuid, Path, description = "Supplier ID"),
    ),
    responses(
        (status = 200, description = "Supplier approved", body = ApiResponse<HomologationResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "School or supplier not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "schools"
)]
pub async fn approve_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path((school_id, supplier_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<HomologationResponse> {
    let record = state
        .services
        .homologations
        .approve(&user, school_id, supplier_id)
        .await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/schools/{id}/suppliers/{supplier_id}",
    summary = "Revoke supplier approval",
    params(
        ("id" = Uuid, Path, description = "School ID"),
        ("supplier_id" = Uuid, Path, description = "Supplier ID"),
    ),
    responses(
        (status = 204, description = "Approval revoked"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Supplier was never approved", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "schools"
)]
pub async fn revoke_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path((school_id, supplier_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .homologations
        .revoke(&user, school_id, supplier_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/schools/{id}/suppliers",
    summary = "Approved suppliers",
    params(("id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 200, description = "Suppliers by name", body = ApiResponse<Vec<SupplierResponse>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "schools"
)]
pub async fn list_approved_suppliers(
    State(state): State<AppState>,
    user: AuthUser,
    Path(school_id): Path<Uuid>,
) -> ApiResult<Vec<SupplierResponse>> {
    ensure_school_access(&user, school_id)?;
    let suppliers = state
        .services
        .homologations
        .list_approved(school_id)
        .await?;
    Ok(Json(ApiResponse::success(
        suppliers.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/schools/{id}/suppliers/available",
    summary = "Suppliers not yet approved",
    params(("id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 200, description = "Suppliers by name", body = ApiResponse<Vec<SupplierResponse>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "schools"
)]
pub async fn list_available_suppliers(
    State(state): State<AppState>,
    user: AuthUser,
    Path(school_id): Path<Uuid>,
) -> ApiResult<Vec<SupplierResponse>> {
    ensure_school_access(&user, school_id)?;
    let suppliers = state
        .services
        .homologations
        .list_available(school_id)
        .await?;
    Ok(Json(ApiResponse::success(
        suppliers.into_iter().map(Into::into).collect(),
    )))
}
