// storefront/src/store/mod.rs

//! Persistence seam. Every query the workflows need is one method here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{ActiveEntitlement, AdminUser, AuditLogEntry, DeliveryRecord, NewAuditLog, NewEntitlement, NewOrder, Order};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
  /// Assigns the order code and the initial pending statuses.
  async fn insert_order(&self, order: NewOrder) -> Result<Order>;
  async fn find_order_by_code(&self, order_code: &str) -> Result<Option<Order>>;
  async fn find_order_by_id(&self, id: Uuid) -> Result<Option<Order>>;

  /// Sets payment to `paid` and records the gateway payment reference.
  async fn mark_order_paid(&self, id: Uuid, gateway_payment_id: &str) -> Result<Order>;
  async fn record_delivery_attempt(&self, id: Uuid, record: &DeliveryRecord) -> Result<()>;

  async fn insert_entitlement(&self, grant: NewEntitlement) -> Result<ActiveEntitlement>;
  /// Oldest expiry first.
  async fn active_entitlements(&self) -> Result<Vec<ActiveEntitlement>>;
  async fn entitlements_for_order(&self, order_id: Uuid) -> Result<Vec<ActiveEntitlement>>;
  async fn deactivate_entitlement(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<()>;

  async fn append_log(&self, entry: NewAuditLog) -> Result<()>;
  /// Newest first.
  async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>>;

  async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>>;
  async fn update_admin_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()>;

  /// Distinct, lowercased contact addresses across all orders.
  async fn customer_emails(&self) -> Result<Vec<String>>;
}
