// storefront/src/models/mod.rs

//! Records persisted by the store.

pub mod admin_user;
pub mod audit_log;
pub mod entitlement;
pub mod order;

pub use admin_user::AdminUser;
pub use audit_log::{AuditLogEntry, LogCategory, NewAuditLog};
pub use entitlement::{ActiveEntitlement, NewEntitlement, RANK_TERM_DAYS};
pub use order::{generate_order_code, DeliveryRecord, DeliveryStatus, NewOrder, Order, PaymentStatus, ProductType};
