/*!
 * # Authentication and Authorization Module
 *
 * Login is a two step exchange: an emailed one-time code is issued for an
 * account ([`AccessCodeService::issue`]) and later redeemed for a signed
 * session token ([`AccessCodeService::redeem`]). Every authenticated request
 * carries that token as a bearer credential; [`auth_middleware`] validates it
 * and installs an [`AuthUser`], the request-scoped actor context that
 * services receive explicitly.
 *
 * Route groups are gated by [`Role`] through [`AuthRouterExt::with_roles`].
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

pub mod access_code;
pub mod accounts;
mod role;

pub use access_code::{AccessCodeService, CodeDelivery, IssuedCode, LoggingCodeDelivery};
pub use accounts::{Account, AccountDirectory};
pub use role::Role;

/// Claim structure for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,               // Account id
    pub role: Role,                // Which account table `sub` lives in
    pub school_id: Option<String>, // Manager's school, or the guardian's student's school
    pub email: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// The acting account of a request. Workflows trust it without
/// re-authenticating and receive it as an explicit argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub actor_id: Uuid,
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub email: String,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Fails with `Forbidden` unless the actor has the given role.
    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} role required, actor is {}",
                role, self.role
            )))
        }
    }

    /// Managers act on their own school; admins on any.
    pub fn can_manage_school(&self, school_id: Uuid) -> bool {
        self.is_admin() || (self.role == Role::Manager && self.school_id == Some(school_id))
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration_secs),
        )
    }
}

/// Issues and validates session tokens.
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
    revoked_tokens: Arc<RwLock<Vec<RevokedToken>>>,
}

#[derive(Clone, Debug)]
struct RevokedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Bearer token handed out after a successful code redemption.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: Role,
    pub actor_id: Uuid,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            revoked_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Signs a session token for an active account.
    pub fn generate_token(&self, account: &Account) -> Result<SessionToken, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: account.id.to_string(),
            role: account.role,
            school_id: account.school_id.map(|id| id.to_string()),
            email: account.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(SessionToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_expiration.as_secs() as i64,
            role: account.role,
            actor_id: account.id,
        })
    }

    /// Validate a token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_revoked(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Ends a session before its natural expiry.
    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.validate_token(token).await?;
        let expiry = DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

        let mut revoked = self.revoked_tokens.write().await;
        let now = Utc::now();
        revoked.retain(|t| t.expiry > now);
        revoked.push(RevokedToken {
            jti: claims.jti,
            expiry,
        });
        Ok(())
    }

    async fn is_token_revoked(&self, token_id: &str) -> bool {
        let revoked = self.revoked_tokens.read().await;
        revoked.iter().any(|t| t.jti == token_id)
    }

    /// Turns validated claims into the request actor.
    pub fn auth_user_from_claims(claims: Claims) -> Result<AuthUser, AuthError> {
        let actor_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let school_id = claims
            .school_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            actor_id,
            role: claims.role,
            school_id,
            email: claims.email,
            token_id: claims.jti,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue session token".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Pulls the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware that validates the bearer token and installs
/// the [`AuthUser`]. Expects an `Arc<AuthService>` request extension.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None => return AuthError::MissingAuth.into_response(),
    };

    let user = match auth_service
        .validate_token(&token)
        .await
        .and_then(AuthService::auth_user_from_claims)
    {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "rejected bearer token");
            return e.into_response();
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// Role middleware; lets the request through when the actor holds any of
/// the allowed roles.
pub async fn role_middleware(
    State(allowed): State<Arc<[Role]>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !allowed.contains(&user.role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[Role]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[Role]) -> Self {
        let allowed: Arc<[Role]> = roles.into();
        self.route_layer(axum::middleware::from_fn_with_state(
            allowed,
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "unit_test_secret_that_is_comfortably_long".into(),
            "conecta-web".into(),
            "conecta-api".into(),
            Duration::from_secs(600),
        ))
    }

    fn manager_account() -> Account {
        Account {
            id: Uuid::new_v4(),
            role: Role::Manager,
            name: "Dora".into(),
            email: "dora@escola.example".into(),
            school_id: Some(Uuid::new_v4()),
        }
    }

    #[tokio::test]
    async fn token_round_trip_preserves_actor_context() {
        let auth = service();
        let account = manager_account();
        let token = auth.generate_token(&account).unwrap();

        let claims = auth.validate_token(&token.access_token).await.unwrap();
        let user = AuthService::auth_user_from_claims(claims).unwrap();
        assert_eq!(user.actor_id, account.id);
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.school_id, account.school_id);
        assert!(user.can_manage_school(account.school_id.unwrap()));
        assert!(!user.can_manage_school(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn token_from_other_secret_is_rejected() {
        let account = manager_account();
        let token = service().generate_token(&account).unwrap();

        let other = AuthService::new(AuthConfig::new(
            "a_completely_different_secret_value_123".into(),
            "conecta-web".into(),
            "conecta-api".into(),
            Duration::from_secs(600),
        ));
        assert_matches!(
            other.validate_token(&token.access_token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let auth = service();
        let token = auth.generate_token(&manager_account()).unwrap();
        auth.revoke_token(&token.access_token).await.unwrap();
        assert_matches!(
            auth.validate_token(&token.access_token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn require_role_maps_to_forbidden() {
        let user = AuthUser {
            actor_id: Uuid::new_v4(),
            role: Role::Guardian,
            school_id: None,
            email: "g@example.com".into(),
            token_id: "t".into(),
        };
        assert!(user.require_role(Role::Guardian).is_ok());
        assert_matches!(
            user.require_role(Role::Supplier),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
