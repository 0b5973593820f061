// Storefront services
pub mod commerce;
pub mod orders;
pub mod payments;
pub mod shipping;
