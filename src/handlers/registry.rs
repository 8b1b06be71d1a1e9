use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{guardian, school, school_manager, student, supplier},
    errors::ServiceError,
    handlers::{catalog::SetActiveRequest, common::created},
    services::registry::{
        GuardianChanges, ManagerChanges, NewGuardian, NewManager, NewSchool, NewStudent,
        NewSupplier, RegistryKind, SchoolChanges, StudentChanges, SupplierChanges,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchoolResponse {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<school::Model> for SchoolResponse {
    fn from(s: school::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            active: s.active,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SupplierAccountResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<supplier::Model> for SupplierAccountResponse {
    fn from(s: supplier::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            phone: s.phone,
            tax_id: s.tax_id,
            active: s.active,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManagerResponse {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<school_manager::Model> for ManagerResponse {
    fn from(m: school_manager::Model) -> Self {
        Self {
            id: m.id,
            school_id: m.school_id,
            name: m.name,
            email: m.email,
            phone: m.phone,
            active: m.active,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub enrollment: String,
    pub grade: String,
    pub gender: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<student::Model> for StudentResponse {
    fn from(s: student::Model) -> Self {
        Self {
            id: s.id,
            school_id: s.school_id,
            name: s.name,
            enrollment: s.enrollment,
            grade: s.grade,
            gender: s.gender,
            active: s.active,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GuardianResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub student_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<guardian::Model> for GuardianResponse {
    fn from(g: guardian::Model) -> Self {
        Self {
            id: g.id,
            name: g.name,
            email: g.email,
            phone: g.phone,
            student_id: g.student_id,
            active: g.active,
            created_at: g.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ManagerQuery {
    pub school_id: Option<Uuid>,
}

fn to_responses<M, R: From<M>>(rows: Vec<M>) -> Vec<R> {
    rows.into_iter().map(Into::into).collect()
}

// Schools

#[utoipa::path(
    post,
    path = "/api/v1/schools",
    summary = "Register school",
    request_body = NewSchool,
    responses(
        (status = 201, description = "School registered", body = ApiResponse<SchoolResponse>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn create_school(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewSchool>,
) -> Result<(StatusCode, Json<ApiResponse<SchoolResponse>>), ServiceError> {
    let school = state.services.registry.create_school(&user, input).await?;
    Ok(created(school.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/schools/{id}",
    summary = "Edit school",
    params(("id" = Uuid, Path, description = "School ID")),
    request_body = SchoolChanges,
    responses(
        (status = 200, description = "School updated", body = ApiResponse<SchoolResponse>),
        (status = 404, description = "School not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn update_school(
    State(state): State<AppState>,
    user: AuthUser,
    Path(school_id): Path<Uuid>,
    Json(changes): Json<SchoolChanges>,
) -> ApiResult<SchoolResponse> {
    let school = state
        .services
        .registry
        .update_school(&user, school_id, changes)
        .await?;
    Ok(Json(ApiResponse::success(school.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/schools",
    summary = "List schools",
    responses(
        (status = 200, description = "Schools by name, inactive included", body = ApiResponse<Vec<SchoolResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn list_schools(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<SchoolResponse>> {
    let schools = state.services.registry.list_schools(&user).await?;
    Ok(Json(ApiResponse::success(to_responses(schools))))
}

// Suppliers

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    summary = "Register supplier",
    request_body = NewSupplier,
    responses(
        (status = 201, description = "Supplier registered", body = ApiResponse<SupplierAccountResponse>),
        (status = 400, description = "Invalid input or email already registered", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewSupplier>,
) -> Result<(StatusCode, Json<ApiResponse<SupplierAccountResponse>>), ServiceError> {
    let supplier = state.services.registry.create_supplier(&user, input).await?;
    Ok(created(supplier.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}",
    summary = "Edit supplier",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = SupplierChanges,
    responses(
        (status = 200, description = "Supplier updated", body = ApiResponse<SupplierAccountResponse>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Path(supplier_id): Path<Uuid>,
    Json(changes): Json<SupplierChanges>,
) -> ApiResult<SupplierAccountResponse> {
    let supplier = state
        .services
        .registry
        .update_supplier(&user, supplier_id, changes)
        .await?;
    Ok(Json(ApiResponse::success(supplier.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    summary = "List suppliers",
    responses(
        (status = 200, description = "Suppliers by name, inactive included", body = ApiResponse<Vec<SupplierAccountResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<SupplierAccountResponse>> {
    let suppliers = state.services.registry.list_suppliers(&user).await?;
    Ok(Json(ApiResponse::success(to_responses(suppliers))))
}

// School managers

#[utoipa::path(
    post,
    path = "/api/v1/managers",
    summary = "Register school manager",
    request_body = NewManager,
    responses(
        (status = 201, description = "Manager registered", body = ApiResponse<ManagerResponse>),
        (status = 400, description = "Invalid input or email already registered", body = crate::errors::ErrorResponse),
        (status = 404, description = "School not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn create_manager(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewManager>,
) -> Result<(StatusCode, Json<ApiResponse<ManagerResponse>>), ServiceError> {
    let manager = state.services.registry.create_manager(&user, input).await?;
    Ok(created(manager.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/managers/{id}",
    summary = "Edit school manager",
    params(("id" = Uuid, Path, description = "Manager ID")),
    request_body = ManagerChanges,
    responses(
        (status = 200, description = "Manager updated", body = ApiResponse<ManagerResponse>),
        (status = 404, description = "Manager not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn update_manager(
    State(state): State<AppState>,
    user: AuthUser,
    Path(manager_id): Path<Uuid>,
    Json(changes): Json<ManagerChanges>,
) -> ApiResult<ManagerResponse> {
    let manager = state
        .services
        .registry
        .update_manager(&user, manager_id, changes)
        .await?;
    Ok(Json(ApiResponse::success(manager.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/managers",
    summary = "List school managers",
    params(ManagerQuery),
    responses(
        (status = 200, description = "Managers by name", body = ApiResponse<Vec<ManagerResponse>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn list_managers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ManagerQuery>,
) -> ApiResult<Vec<ManagerResponse>> {
    let managers = state
        .services
        .registry
        .list_managers(&user, query.school_id)
        .await?;
    Ok(Json(ApiResponse::success(to_responses(managers))))
}

// Students

#[utoipa::path(
    post,
    path = "/api/v1/students",
    summary = "Register student",
    request_body = NewStudent,
    responses(
        (status = 201, description = "Student registered", body = ApiResponse<StudentResponse>),
        (status = 400, description = "Invalid input or duplicate enrollment", body = crate::errors::ErrorResponse),
        (status = 404, description = "School not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn create_student(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewStudent>,
) -> Result<(StatusCode, Json<ApiResponse<StudentResponse>>), ServiceError> {
    let student = state.services.registry.create_student(&user, input).await?;
    Ok(created(student.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/students/{id}",
    summary = "Edit student",
    params(("id" = Uuid, Path, description = "Student ID")),
    request_body = StudentChanges,
    responses(
        (status = 200, description = "Student updated", body = ApiResponse<StudentResponse>),
        (status = 404, description = "Student not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn update_student(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<Uuid>,
    Json(changes): Json<StudentChanges>,
) -> ApiResult<StudentResponse> {
    let student = state
        .services
        .registry
        .update_student(&user, student_id, changes)
        .await?;
    Ok(Json(ApiResponse::success(student.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/schools/{id}/students",
    summary = "List students of a school",
    params(("id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 200, description = "Students by name", body = ApiResponse<Vec<StudentResponse>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn list_students(
    State(state): State<AppState>,
    user: AuthUser,
    Path(school_id): Path<Uuid>,
) -> ApiResult<Vec<StudentResponse>> {
    let students = state
        .services
        .registry
        .list_students(&user, school_id)
        .await?;
    Ok(Json(ApiResponse::success(to_responses(students))))
}

// Guardians

#[utoipa::path(
    post,
    path = "/api/v1/guardians",
    summary = "Register guardian",
    request_body = NewGuardian,
    responses(
        (status = 201, description = "Guardian registered", body = ApiResponse<GuardianResponse>),
        (status = 400, description = "Invalid input or email already registered", body = crate::errors::ErrorResponse),
        (status = 404, description = "Student not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn create_guardian(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewGuardian>,
) -> Result<(StatusCode, Json<ApiResponse<GuardianResponse>>), ServiceError> {
    let guardian = state.services.registry.create_guardian(&user, input).await?;
    Ok(created(guardian.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/guardians/{id}",
    summary = "Edit guardian",
    params(("id" = Uuid, Path, description = "Guardian ID")),
    request_body = GuardianChanges,
    responses(
        (status = 200, description = "Guardian updated", body = ApiResponse<GuardianResponse>),
        (status = 404, description = "Guardian or student not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn update_guardian(
    State(state): State<AppState>,
    user: AuthUser,
    Path(guardian_id): Path<Uuid>,
    Json(changes): Json<GuardianChanges>,
) -> ApiResult<GuardianResponse> {
    let guardian = state
        .services
        .registry
        .update_guardian(&user, guardian_id, changes)
        .await?;
    Ok(Json(ApiResponse::success(guardian.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/guardians",
    summary = "List guardians",
    responses(
        (status = 200, description = "Guardians by name, inactive included", body = ApiResponse<Vec<GuardianResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn list_guardians(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<GuardianResponse>> {
    let guardians = state.services.registry.list_guardians(&user).await?;
    Ok(Json(ApiResponse::success(to_responses(guardians))))
}

#[utoipa::path(
    put,
    path = "/api/v1/registry/{kind}/{id}/active",
    summary = "Activate or deactivate a registry entry",
    description = "Deactivated accounts can no longer sign in. Rows are kept for order and statement history",
    params(
        ("kind" = RegistryKind, Path, description = "schools, suppliers, managers, students or guardians"),
        ("id" = Uuid, Path, description = "Entry ID"),
    ),
    request_body = SetActiveRequest,
    responses(
        (status = 204, description = "Activation changed"),
        (status = 400, description = "Unknown kind", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "registry"
)]
pub async fn set_entry_active(
    State(state): State<AppState>,
    user: AuthUser,
    Path((kind, id)): Path<(RegistryKind, Uuid)>,
    Json(request): Json<SetActiveRequest>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .registry
        .set_active(&user, kind, id, request.active)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
