//! Payment page creation and gateway notification reconciliation.

pub mod gateway;
pub mod notification;

pub use gateway::{MidtransSnapClient, PaymentCustomer, PaymentGateway, PaymentLink, PaymentRequest};
pub use notification::{
    notification_signature, verify_signature, NotificationOutcome, PaymentNotification,
    PaymentService,
};
