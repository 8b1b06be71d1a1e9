pub mod auth;
pub mod cart;
pub mod catalog;
pub mod commissions;
pub mod common;
pub mod homologations;
pub mod orders;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::auth::{AccessCodeService, AuthService, CodeDelivery};
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    cart::CartService, catalog::CatalogService, commission::CommissionService,
    homologation::HomologationService, inventory::InventoryService,
    order_status::OrderStatusService, orders::OrderService, registry::RegistryService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub access_codes: Arc<AccessCodeService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub inventory: Arc<InventoryService>,
    pub catalog: Arc<CatalogService>,
    pub homologations: Arc<HomologationService>,
    pub commissions: Arc<CommissionService>,
    pub registry: Arc<RegistryService>,
}

impl AppServices {
    /// Wires every service onto the shared connection pool and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        code_delivery: Arc<dyn CodeDelivery>,
        config: &AppConfig,
    ) -> Self {
        let access_codes = Arc::new(AccessCodeService::new(
            db.clone(),
            auth_service,
            code_delivery,
            event_sender.clone(),
            config.access_code_length,
            Duration::from_secs(config.access_code_ttl_secs),
        ));

        Self {
            access_codes,
            cart: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db.clone(), event_sender.clone())),
            inventory: Arc::new(InventoryService::new(db.clone(), event_sender.clone())),
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            homologations: Arc::new(HomologationService::new(db.clone(), event_sender.clone())),
            registry: Arc::new(RegistryService::new(db.clone(), event_sender.clone())),
            commissions: Arc::new(CommissionService::new(db, event_sender)),
        }
    }
}
