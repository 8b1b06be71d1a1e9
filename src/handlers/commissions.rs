use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::commission_statement::{self, StatementStatus},
    handlers::common::{non_negative_amount, validate_input},
    services::commission::{StatementListing, SupplierSale},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct GenerateStatementsRequest {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterPaymentRequest {
    #[validate(custom = "non_negative_amount")]
    pub amount_paid: Decimal,
    /// Defaults to today (UTC).
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatementQuery {
    pub status: Option<StatementStatus>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct SalesQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatementResponse {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub reference_month: NaiveDate,
    pub total_sales: Decimal,
    pub total_commission: Decimal,
    pub net_amount: Decimal,
    pub status: StatementStatus,
    pub payment_date: Option<NaiveDate>,
    pub amount_paid: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl From<commission_statement::Model> for StatementResponse {
    fn from(s: commission_statement::Model) -> Self {
        Self {
            id: s.id,
            supplier_id: s.supplier_id,
            reference_month: s.reference_month,
            total_sales: s.total_sales,
            total_commission: s.total_commission,
            net_amount: s.net_amount,
            status: s.status,
            payment_date: s.payment_date,
            amount_paid: s.amount_paid,
            updated_at: s.updated_at,
        }
    }
}

/// Statement row in the administrator listing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatementListingResponse {
    #[serde(flatten)]
    pub statement: StatementResponse,
    pub supplier_name: String,
    pub supplier_email: String,
}

impl From<StatementListing> for StatementListingResponse {
    fn from(listing: StatementListing) -> Self {
        Self {
            statement: listing.statement.into(),
            supplier_name: listing.supplier_name,
            supplier_email: listing.supplier_email,
        }
    }
}

fn to_responses(statements: Vec<commission_statement::Model>) -> Vec<StatementResponse> {
    statements.into_iter().map(Into::into).collect()
}

#[utoipa::path(
    post,
    path = "/api/v1/commissions/statements",
    summary = "Generate monthly statements",
    description = "Computes one statement per supplier with billable sales in the month. Safe to repeat",
    request_body = GenerateStatementsRequest,
    responses(
        (status = 200, description = "Statements for the month; empty when there were no sales", body = ApiResponse<Vec<StatementResponse>>),
        (status = 400, description = "Invalid month", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "commissions"
)]
pub async fn generate_statements(
    State(state): State<AppState>,
    Json(request): Json<GenerateStatementsRequest>,
) -> ApiResult<Vec<StatementResponse>> {
    validate_input(&request)?;
    let statements = state
        .services
        .commissions
        .generate_monthly_statement(request.year, request.month)
        .await?;
    Ok(Json(ApiResponse::success(to_responses(statements))))
}

#[utoipa::path(
    get,
    path = "/api/v1/commissions/statements",
    summary = "List statements",
    params(StatementQuery),
    responses(
        (status = 200, description = "Statements with supplier contact, newest month first", body = ApiResponse<Vec<StatementListingResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "commissions"
)]
pub async fn list_statements(
    State(state): State<AppState>,
    Query(query): Query<StatementQuery>,
) -> ApiResult<Vec<StatementListingResponse>> {
    let statements = state.services.commissions.list_all(query.status).await?;
    Ok(Json(ApiResponse::success(
        statements.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/commissions/statements/{id}",
    summary = "Get statement",
    params(("id" = Uuid, Path, description = "Statement ID")),
    responses(
        (status = 200, description = "Statement", body = ApiResponse<StatementResponse>),
        (status = 404, description = "Statement not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "commissions"
)]
pub async fn get_statement(
    State(state): State<AppState>,
    Path(statement_id): Path<Uuid>,
) -> ApiResult<StatementResponse> {
    let statement = state
        .services
        .commissions
        .get_statement(statement_id)
        .await?;
    Ok(Json(ApiResponse::success(statement.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/commissions/statements/{id}/payment",
    summary = "Register payment",
    description = "Marks a statement as paid. The amount is stored as given even if it differs from the net amount",
    params(("id" = Uuid, Path, description = "Statement ID")),
    request_body = RegisterPaymentRequest,
    responses(
        (status = 200, description = "Statement paid", body = ApiResponse<StatementResponse>),
        (status = 400, description = "Negative amount", body = crate::errors::ErrorResponse),
        (status = 404, description = "Statement not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "commissions"
)]
pub async fn register_payment(
    State(state): State<AppState>,
    Path(statement_id): Path<Uuid>,
    Json(request): Json<RegisterPaymentRequest>,
) -> ApiResult<StatementResponse> {
    validate_input(&request)?;
    let statement = state
        .services
        .commissions
        .register_payment(statement_id, request.amount_paid, request.payment_date)
        .await?;
    Ok(Json(ApiResponse::success(statement.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/commissions/mine",
    summary = "Own statements",
    responses(
        (status = 200, description = "The supplier's statements, newest month first", body = ApiResponse<Vec<StatementResponse>>),
    ),
    security(("Bearer" = [])),
    tag = "commissions"
)]
pub async fn my_statements(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<StatementResponse>> {
    let statements = state
        .services
        .commissions
        .list_for_supplier(user.actor_id)
        .await?;
    Ok(Json(ApiResponse::success(to_responses(statements))))
}

#[utoipa::path(
    get,
    path = "/api/v1/commissions/sales",
    summary = "Monthly sales detail",
    params(SalesQuery),
    responses(
        (status = 200, description = "Per-order amounts for the supplier", body = ApiResponse<Vec<SupplierSale>>),
        (status = 400, description = "Invalid month", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "commissions"
)]
pub async fn my_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SalesQuery>,
) -> ApiResult<Vec<SupplierSale>> {
    validate_input(&query)?;
    let sales = state
        .services
        .commissions
        .monthly_sales_detail(user.actor_id, query.year, query.month)
        .await?;
    Ok(Json(ApiResponse::success(sales)))
}
