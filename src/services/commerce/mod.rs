//! Storefront commerce: catalog, session cart and checkout
pub mod cart_service;
pub mod checkout_service;
pub mod product_catalog_service;

pub use cart_service::{AddToCartInput, CartService, CartWithItems, ItemQuantity};
pub use checkout_service::{CheckoutInput, CheckoutResult, CheckoutService};
pub use product_catalog_service::{CreateProductInput, ProductCatalogService};
