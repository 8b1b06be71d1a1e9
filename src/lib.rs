//! Conecta API Library
//!
//! School uniform ordering: guardians fill a cart from their school's
//! approved catalog, place orders that reserve stock atomically, suppliers
//! move orders through production, and the platform settles a monthly
//! commission with each supplier.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService, Role};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(response.message.is_some());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned API routes, each group gated by the roles allowed to use it.
pub fn api_v1_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/auth/access-codes", post(handlers::auth::issue_access_code))
        .route("/auth/sessions", post(handlers::auth::create_session));

    let signed_in = Router::new()
        .route("/auth/sessions", delete(handlers::auth::delete_session))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/items", get(handlers::orders::get_order_items))
        .with_auth();

    let guardian = Router::new()
        .route(
            "/cart",
            get(handlers::cart::get_cart)
                .post(handlers::cart::add_to_cart)
                .delete(handlers::cart::clear_cart),
        )
        .route(
            "/cart/lines/:id",
            put(handlers::cart::update_cart_line).delete(handlers::cart::remove_cart_line),
        )
        .route("/cart/summary", get(handlers::cart::cart_summary))
        .route("/cart/stock-check", get(handlers::cart::cart_stock_check))
        .route("/orders", post(handlers::orders::place_order))
        .with_roles(&[Role::Guardian]);

    let supplier = Router::new()
        .route("/orders/:id/status", put(handlers::orders::update_order_status))
        .route("/products", post(handlers::catalog::create_product))
        .route("/products/mine", get(handlers::catalog::list_my_products))
        .route("/commissions/mine", get(handlers::commissions::my_statements))
        .route("/commissions/sales", get(handlers::commissions::my_sales))
        .with_roles(&[Role::Supplier]);

    // Owners manage their products; admins may step in.
    let products = Router::new()
        .route(
            "/products/:id",
            get(handlers::catalog::get_product).put(handlers::catalog::update_product),
        )
        .route("/products/:id/active", put(handlers::catalog::set_product_active))
        .route(
            "/products/:id/variants",
            get(handlers::catalog::list_variants).post(handlers::catalog::add_variant),
        )
        .route("/variants/:id/stock", put(handlers::catalog::set_variant_stock))
        .with_roles(&[Role::Supplier, Role::Admin]);

    let school = Router::new()
        .route(
            "/products/:id/approvals",
            post(handlers::catalog::approve_product).delete(handlers::catalog::revoke_product),
        )
        .route(
            "/schools/:id/suppliers",
            get(handlers::homologations::list_approved_suppliers),
        )
        .route(
            "/schools/:id/suppliers/available",
            get(handlers::homologations::list_available_suppliers),
        )
        .route("/schools/:id/students", get(handlers::registry::list_students))
        .route("/managers", get(handlers::registry::list_managers))
        .route(
            "/schools/:id/suppliers/:supplier_id",
            post(handlers::homologations::approve_supplier)
                .delete(handlers::homologations::revoke_supplier),
        )
        .with_roles(&[Role::Manager, Role::Admin]);

    let catalog = Router::new()
        .route("/catalog", get(handlers::catalog::school_catalog))
        .with_roles(&[Role::Guardian, Role::Manager]);

    let admin = Router::new()
        .route(
            "/commissions/statements",
            get(handlers::commissions::list_statements)
                .post(handlers::commissions::generate_statements),
        )
        .route(
            "/commissions/statements/:id",
            get(handlers::commissions::get_statement),
        )
        .route(
            "/commissions/statements/:id/payment",
            post(handlers::commissions::register_payment),
        )
        .route(
            "/schools",
            get(handlers::registry::list_schools).post(handlers::registry::create_school),
        )
        .route("/schools/:id", put(handlers::registry::update_school))
        .route(
            "/suppliers",
            get(handlers::registry::list_suppliers).post(handlers::registry::create_supplier),
        )
        .route("/suppliers/:id", put(handlers::registry::update_supplier))
        .route("/managers", post(handlers::registry::create_manager))
        .route("/managers/:id", put(handlers::registry::update_manager))
        .route("/students", post(handlers::registry::create_student))
        .route("/students/:id", put(handlers::registry::update_student))
        .route(
            "/guardians",
            get(handlers::registry::list_guardians).post(handlers::registry::create_guardian),
        )
        .route("/guardians/:id", put(handlers::registry::update_guardian))
        .route(
            "/registry/:kind/:id/active",
            put(handlers::registry::set_entry_active),
        )
        .with_roles(&[Role::Admin]);

    Router::new()
        .merge(public)
        .merge(signed_in)
        .merge(guardian)
        .merge(supplier)
        .merge(products)
        .merge(school)
        .merge(catalog)
        .merge(admin)
}

/// The full HTTP application: health, versioned API and Swagger UI, with
/// request ids and request tracing applied. Transport concerns such as CORS
/// and compression are added by the binary.
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "conecta-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
