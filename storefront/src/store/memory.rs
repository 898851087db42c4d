// storefront/src/store/memory.rs

//! Process-local store used when no database is configured, and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::types::Json;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::Store;
use crate::errors::{AppError, Result};
use crate::models::{
  generate_order_code, ActiveEntitlement, AdminUser, AuditLogEntry, DeliveryRecord, DeliveryStatus, NewAuditLog,
  NewEntitlement, NewOrder, Order, PaymentStatus,
};
use crate::services::credentials::LEGACY_MARKER;

#[derive(Default)]
struct Tables {
  orders: Vec<Order>,
  active_ranks: Vec<ActiveEntitlement>,
  logs: Vec<AuditLogEntry>,
  admin_users: Vec<AdminUser>,
}

#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an admin account; `None` stores the legacy marker.
  pub fn seed_admin(&self, email: &str, password_hash: Option<&str>) -> AdminUser {
    let admin = AdminUser {
      id: Uuid::new_v4(),
      email: email.to_string(),
      password_hash: password_hash.unwrap_or(LEGACY_MARKER).to_string(),
      created_at: Utc::now(),
    };
    self.tables.lock().admin_users.push(admin.clone());
    admin
  }

  /// Every log row, oldest first.
  pub fn logs(&self) -> Vec<AuditLogEntry> {
    self.tables.lock().logs.clone()
  }

  /// Every rank row regardless of state.
  pub fn all_entitlements(&self) -> Vec<ActiveEntitlement> {
    self.tables.lock().active_ranks.clone()
  }
}

fn missing_order(id: Uuid) -> AppError {
  AppError::NotFound(format!("Order {} not found", id))
}

#[async_trait]
impl Store for MemoryStore {
  async fn insert_order(&self, order: NewOrder) -> Result<Order> {
    let now = Utc::now();
    let row = Order {
      id: Uuid::new_v4(),
      order_code: generate_order_code(),
      product_type: order.product_type,
      product_name: order.product_name,
      amount: order.amount,
      minecraft_username: order.minecraft_username,
      gift_recipient: order.gift_recipient,
      email: order.email,
      gateway_order_id: order.gateway_order_id,
      gateway_payment_id: None,
      payment_status: PaymentStatus::Pending,
      delivery_status: DeliveryStatus::Pending,
      command_executed: None,
      error_log: None,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().orders.push(row.clone());
    Ok(row)
  }

  async fn find_order_by_code(&self, order_code: &str) -> Result<Option<Order>> {
    Ok(self.tables.lock().orders.iter().find(|o| o.order_code == order_code).cloned())
  }

  async fn find_order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.tables.lock().orders.iter().find(|o| o.id == id).cloned())
  }

  async fn mark_order_paid(&self, id: Uuid, gateway_payment_id: &str) -> Result<Order> {
    let mut tables = self.tables.lock();
    let order = tables.orders.iter_mut().find(|o| o.id == id).ok_or_else(|| missing_order(id))?;
    order.payment_status = PaymentStatus::Paid;
    order.gateway_payment_id = Some(gateway_payment_id.to_string());
    order.updated_at = Utc::now();
    Ok(order.clone())
  }

  async fn record_delivery_attempt(&self, id: Uuid, record: &DeliveryRecord) -> Result<()> {
    let mut tables = self.tables.lock();
    let order = tables.orders.iter_mut().find(|o| o.id == id).ok_or_else(|| missing_order(id))?;
    order.payment_status = record.payment_status;
    order.delivery_status = record.delivery_status;
    order.command_executed = record.command_executed.clone();
    order.error_log = record.error_log.clone();
    order.updated_at = Utc::now();
    Ok(())
  }

  async fn insert_entitlement(&self, grant: NewEntitlement) -> Result<ActiveEntitlement> {
    let row = ActiveEntitlement {
      id: Uuid::new_v4(),
      minecraft_username: grant.minecraft_username,
      rank_name: grant.rank_name,
      granted_at: grant.granted_at,
      expires_at: grant.expires_at,
      active: true,
      revoked_at: None,
      order_id: grant.order_id,
    };
    self.tables.lock().active_ranks.push(row.clone());
    Ok(row)
  }

  async fn active_entitlements(&self) -> Result<Vec<ActiveEntitlement>> {
    let mut rows: Vec<_> = self.tables.lock().active_ranks.iter().filter(|r| r.active).cloned().collect();
    rows.sort_by_key(|r| r.expires_at);
    Ok(rows)
  }

  async fn entitlements_for_order(&self, order_id: Uuid) -> Result<Vec<ActiveEntitlement>> {
    Ok(
      self
        .tables
        .lock()
        .active_ranks
        .iter()
        .filter(|r| r.order_id == Some(order_id))
        .cloned()
        .collect(),
    )
  }

  async fn deactivate_entitlement(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<()> {
    if let Some(row) = self.tables.lock().active_ranks.iter_mut().find(|r| r.id == id) {
      row.active = false;
      row.revoked_at = Some(revoked_at);
    }
    Ok(())
  }

  async fn append_log(&self, entry: NewAuditLog) -> Result<()> {
    self.tables.lock().logs.push(AuditLogEntry {
      id: Uuid::new_v4(),
      category: entry.category.as_str().to_string(),
      message: entry.message,
      metadata: Json(entry.metadata),
      order_id: entry.order_id,
      created_at: Utc::now(),
    });
    Ok(())
  }

  async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>> {
    let limit = usize::try_from(limit).unwrap_or(0);
    Ok(self.tables.lock().logs.iter().rev().take(limit).cloned().collect())
  }

  async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
    Ok(
      self
        .tables
        .lock()
        .admin_users
        .iter()
        .find(|a| a.email.eq_ignore_ascii_case(email))
        .cloned(),
    )
  }

  async fn update_admin_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
    if let Some(admin) = self.tables.lock().admin_users.iter_mut().find(|a| a.id == id) {
      admin.password_hash = password_hash.to_string();
    }
    Ok(())
  }

  async fn customer_emails(&self) -> Result<Vec<String>> {
    let emails: BTreeSet<String> = self
      .tables
      .lock()
      .orders
      .iter()
      .filter_map(|o| o.contact_email().map(str::to_lowercase))
      .collect();
    Ok(emails.into_iter().collect())
  }
}
