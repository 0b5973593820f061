pub mod carts;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod tracking;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    commerce::{CartService, CheckoutService, ProductCatalogService},
    orders::OrderService,
    payments::{PaymentGateway, PaymentService},
    shipping::{AreaMapper, AreaMode, CourierClient, ShippingService},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductCatalogService>,
    pub carts: Arc<CartService>,
    pub shipping: Arc<ShippingService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    /// Wires every service from the configuration and the two upstream clients.
    ///
    /// Fails only when a configured area table cannot be read.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        courier: Arc<dyn CourierClient>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, ServiceError> {
        let mode = AreaMode::from_sandbox_flag(config.shipping.is_sandbox());
        let areas = Arc::new(AreaMapper::load(
            config.shipping.area_table_path.as_deref(),
            mode,
        )?);
        info!(?mode, "area table loaded");

        let shipping = ShippingService::new(courier, areas, config.shipping.clone());
        let products = ProductCatalogService::new(
            db.clone(),
            config.catalog.clone(),
            config.app_url.clone(),
        );
        let carts = CartService::new(db.clone(), event_sender.clone(), config.cart.clone());
        let orders = OrderService::new(db.clone(), event_sender.clone(), shipping.clone());
        let checkout = CheckoutService::new(
            db.clone(),
            config.clone(),
            event_sender.clone(),
            carts.clone(),
            shipping.clone(),
            orders.clone(),
            gateway,
        );
        let payments = PaymentService::new(db, config, event_sender);

        Ok(Self {
            products: Arc::new(products),
            carts: Arc::new(carts),
            shipping: Arc::new(shipping),
            checkout: Arc::new(checkout),
            orders: Arc::new(orders),
            payments: Arc::new(payments),
        })
    }
}
