use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conecta API",
        version = "1.0.0",
        description = r#"
# Conecta School Uniform API

Ordering platform connecting schools, uniform suppliers and guardians.

## Features

- **Catalog**: Suppliers publish products with size, color and gender variants
- **Homologation**: School managers approve suppliers and products per grade
- **Cart & Orders**: Guardians order from their school's catalog; stock is reserved atomically
- **Order Lifecycle**: Suppliers move orders from pending to delivered
- **Commissions**: Monthly statements of the platform's 15% commission per supplier

## Authentication

Request a login code with `POST /api/v1/auth/access-codes`, exchange it at
`POST /api/v1/auth/sessions` and send the returned token on every call:

```
Authorization: Bearer <token>
```

## Error Handling

Errors share one body shape and carry the request id echoed in `X-Request-Id`:

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock for Camiseta Polo: requested 2, available 0",
  "request_id": "req-abc123xyz",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Login codes and sessions"),
        (name = "cart", description = "Guardian shopping cart"),
        (name = "orders", description = "Order placement and lifecycle"),
        (name = "catalog", description = "Products, variants, stock and school catalogs"),
        (name = "schools", description = "Supplier homologation per school"),
        (name = "commissions", description = "Monthly commission statements"),
        (name = "registry", description = "Schools, suppliers, managers, students and guardians")
    ),
    paths(
        // Auth
        crate::handlers::auth::issue_access_code,
        crate::handlers::auth::create_session,
        crate::handlers::auth::delete_session,

        // Cart
        crate::handlers::cart::get_cart,
        crate::handlers::cart::add_to_cart,
        crate::handlers::cart::clear_cart,
        crate::handlers::cart::update_cart_line,
        crate::handlers::cart::remove_cart_line,
        crate::handlers::cart::cart_summary,
        crate::handlers::cart::cart_stock_check,

        // Orders
        crate::handlers::orders::place_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::update_order_status,

        // Catalog
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::update_product,
        crate::handlers::catalog::set_product_active,
        crate::handlers::catalog::list_my_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::add_variant,
        crate::handlers::catalog::list_variants,
        crate::handlers::catalog::set_variant_stock,
        crate::handlers::catalog::approve_product,
        crate::handlers::catalog::revoke_product,
        crate::handlers::catalog::school_catalog,

        // Schools
        crate::handlers::homologations::approve_supplier,
        crate::handlers::homologations::revoke_supplier,
        crate::handlers::homologations::list_approved_suppliers,
        crate::handlers::homologations::list_available_suppliers,

        // Commissions
        crate::handlers::commissions::generate_statements,
        crate::handlers::commissions::list_statements,
        crate::handlers::commissions::get_statement,
        crate::handlers::commissions::register_payment,
        crate::handlers::commissions::my_statements,
        crate::handlers::commissions::my_sales,

        // Registry
        crate::handlers::registry::create_school,
        crate::handlers::registry::update_school,
        crate::handlers::registry::list_schools,
        crate::handlers::registry::create_supplier,
        crate::handlers::registry::update_supplier,
        crate::handlers::registry::list_suppliers,
        crate::handlers::registry::create_manager,
        crate::handlers::registry::update_manager,
        crate::handlers::registry::list_managers,
        crate::handlers::registry::create_student,
        crate::handlers::registry::update_student,
        crate::handlers::registry::list_students,
        crate::handlers::registry::create_guardian,
        crate::handlers::registry::update_guardian,
        crate::handlers::registry::list_guardians,
        crate::handlers::registry::set_entry_active,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::auth::Role,
            crate::auth::SessionToken,
            crate::auth::access_code::IssuedCode,
            crate::handlers::auth::IssueCodeRequest,
            crate::handlers::auth::CreateSessionRequest,

            crate::handlers::cart::AddToCartRequest,
            crate::handlers::cart::UpdateCartLineRequest,
            crate::services::cart::CartLineView,
            crate::services::cart::CartSummary,
            crate::services::cart::StockShortfall,

            crate::entities::order::OrderStatus,
            crate::services::orders::PlaceOrderRequest,
            crate::handlers::orders::OrderResponse,
            crate::handlers::orders::OrderItemResponse,
            crate::handlers::orders::UpdateOrderStatusRequest,

            crate::handlers::catalog::CreateProductRequest,
            crate::handlers::catalog::UpdateProductRequest,
            crate::handlers::catalog::SetActiveRequest,
            crate::handlers::catalog::AddVariantRequest,
            crate::handlers::catalog::SetStockRequest,
            crate::handlers::catalog::ProductApprovalRequest,
            crate::handlers::catalog::ProductResponse,
            crate::handlers::catalog::VariantResponse,
            crate::handlers::catalog::ApprovalResponse,
            crate::services::catalog::CatalogEntry,
            crate::services::catalog::CatalogVariant,

            crate::handlers::homologations::HomologationResponse,
            crate::handlers::homologations::SupplierResponse,

            crate::entities::commission_statement::StatementStatus,
            crate::handlers::commissions::GenerateStatementsRequest,
            crate::handlers::commissions::RegisterPaymentRequest,
            crate::handlers::commissions::StatementResponse,
            crate::handlers::commissions::StatementListingResponse,
            crate::services::commission::SupplierSale,

            crate::services::registry::RegistryKind,
            crate::services::registry::NewSchool,
            crate::services::registry::SchoolChanges,
            crate::services::registry::NewSupplier,
            crate::services::registry::SupplierChanges,
            crate::services::registry::NewManager,
            crate::services::registry::ManagerChanges,
            crate::services::registry::NewStudent,
            crate::services::registry::StudentChanges,
            crate::services::registry::NewGuardian,
            crate::services::registry::GuardianChanges,
            crate::handlers::registry::SchoolResponse,
            crate::handlers::registry::SupplierAccountResponse,
            crate::handlers::registry::ManagerResponse,
            crate::handlers::registry::StudentResponse,
            crate::handlers::registry::GuardianResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by the secured paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
