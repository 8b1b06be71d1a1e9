use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{bearer_token, AuthError, AuthUser, IssuedCode, Role, SessionToken},
    errors::ServiceError,
    handlers::common::validate_input,
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct IssueCodeRequest {
    #[validate(email)]
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 4, max = 12))]
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/access-codes",
    summary = "Request a login code",
    description = "Issues a one-time login code for an active account and hands it to the delivery channel",
    request_body = IssueCodeRequest,
    responses(
        (status = 202, description = "Code issued", body = ApiResponse<IssuedCode>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "No active account for that email and role", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn issue_access_code(
    State(state): State<AppState>,
    Json(request): Json<IssueCodeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IssuedCode>>), ServiceError> {
    validate_input(&request)?;
    let issued = state
        .services
        .access_codes
        .issue(&request.email, request.role)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(issued))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/sessions",
    summary = "Sign in with a login code",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session started", body = ApiResponse<SessionToken>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid or expired code", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionToken>>), ServiceError> {
    validate_input(&request)?;
    let token = state
        .services
        .access_codes
        .redeem(&request.email, &request.code)
        .await?;
    Ok(crate::handlers::common::created(token))
}

#[utoipa::path(
    delete,
    path = "/api/v1/auth/sessions",
    summary = "Sign out",
    description = "Revokes the bearer token used for this request",
    responses(
        (status = 204, description = "Session ended"),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    _user: AuthUser,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingAuth)?;
    state.auth.revoke_token(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
