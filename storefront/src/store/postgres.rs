// storefront/src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::Store;
use crate::errors::{AppError, Result};
use crate::models::{
  generate_order_code, ActiveEntitlement, AdminUser, AuditLogEntry, DeliveryRecord, NewAuditLog, NewEntitlement,
  NewOrder, Order,
};

const ORDER_COLUMNS: &str = "id, order_code, product_type, product_name, amount, minecraft_username, gift_recipient, \
   email, gateway_order_id, gateway_payment_id, payment_status, delivery_status, command_executed, error_log, \
   created_at, updated_at";

const ENTITLEMENT_COLUMNS: &str =
  "id, minecraft_username, rank_name, granted_at, expires_at, active, revoked_at, order_id";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl Store for PgStore {
  #[instrument(name = "pg::insert_order", skip_all, fields(player = %order.minecraft_username), err(Display))]
  async fn insert_order(&self, order: NewOrder) -> Result<Order> {
    let sql = format!(
      "INSERT INTO orders (id, order_code, product_type, product_name, amount, minecraft_username, gift_recipient, \
       email, gateway_order_id) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
      ORDER_COLUMNS
    );
    let row = sqlx::query_as::<_, Order>(&sql)
      .bind(Uuid::new_v4())
      .bind(generate_order_code())
      .bind(&order.product_type)
      .bind(&order.product_name)
      .bind(order.amount)
      .bind(&order.minecraft_username)
      .bind(&order.gift_recipient)
      .bind(&order.email)
      .bind(&order.gateway_order_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(row)
  }

  async fn find_order_by_code(&self, order_code: &str) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE order_code = $1", ORDER_COLUMNS);
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(order_code)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn find_order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  #[instrument(name = "pg::mark_order_paid", skip(self), err(Display))]
  async fn mark_order_paid(&self, id: Uuid, gateway_payment_id: &str) -> Result<Order> {
    let sql = format!(
      "UPDATE orders SET payment_status = 'paid', gateway_payment_id = $2, updated_at = NOW() \
       WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    sqlx::query_as::<_, Order>(&sql)
      .bind(id)
      .bind(gateway_payment_id)
      .fetch_optional(&self.pool)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", id)))
  }

  #[instrument(name = "pg::record_delivery_attempt", skip(self, record), err(Display))]
  async fn record_delivery_attempt(&self, id: Uuid, record: &DeliveryRecord) -> Result<()> {
    let result = sqlx::query(
      "UPDATE orders SET payment_status = $2, delivery_status = $3, command_executed = $4, error_log = $5, \
       updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(record.payment_status)
    .bind(record.delivery_status)
    .bind(&record.command_executed)
    .bind(&record.error_log)
    .execute(&self.pool)
    .await?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("Order {} not found", id)));
    }
    Ok(())
  }

  #[instrument(name = "pg::insert_entitlement", skip_all, fields(player = %grant.minecraft_username, rank = %grant.rank_name), err(Display))]
  async fn insert_entitlement(&self, grant: NewEntitlement) -> Result<ActiveEntitlement> {
    let sql = format!(
      "INSERT INTO active_ranks (id, minecraft_username, rank_name, granted_at, expires_at, active, order_id) \
       VALUES ($1, $2, $3, $4, $5, TRUE, $6) RETURNING {}",
      ENTITLEMENT_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, ActiveEntitlement>(&sql)
        .bind(Uuid::new_v4())
        .bind(&grant.minecraft_username)
        .bind(&grant.rank_name)
        .bind(grant.granted_at)
        .bind(grant.expires_at)
        .bind(grant.order_id)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn active_entitlements(&self) -> Result<Vec<ActiveEntitlement>> {
    let sql = format!(
      "SELECT {} FROM active_ranks WHERE active = TRUE ORDER BY expires_at ASC",
      ENTITLEMENT_COLUMNS
    );
    Ok(sqlx::query_as::<_, ActiveEntitlement>(&sql).fetch_all(&self.pool).await?)
  }

  async fn entitlements_for_order(&self, order_id: Uuid) -> Result<Vec<ActiveEntitlement>> {
    let sql = format!(
      "SELECT {} FROM active_ranks WHERE order_id = $1 ORDER BY granted_at ASC",
      ENTITLEMENT_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, ActiveEntitlement>(&sql)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn deactivate_entitlement(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE active_ranks SET active = FALSE, revoked_at = $2 WHERE id = $1")
      .bind(id)
      .bind(revoked_at)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn append_log(&self, entry: NewAuditLog) -> Result<()> {
    sqlx::query("INSERT INTO logs (id, category, message, metadata, order_id) VALUES ($1, $2, $3, $4, $5)")
      .bind(Uuid::new_v4())
      .bind(entry.category.as_str())
      .bind(&entry.message)
      .bind(Json(&entry.metadata))
      .bind(entry.order_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>> {
    Ok(
      sqlx::query_as::<_, AuditLogEntry>(
        "SELECT id, category, message, metadata, order_id, created_at FROM logs ORDER BY created_at DESC LIMIT $1",
      )
      .bind(limit)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
    Ok(
      sqlx::query_as::<_, AdminUser>(
        "SELECT id, email, password_hash, created_at FROM admin_users WHERE LOWER(email) = LOWER($1)",
      )
      .bind(email)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn update_admin_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE admin_users SET password_hash = $2 WHERE id = $1")
      .bind(id)
      .bind(password_hash)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn customer_emails(&self) -> Result<Vec<String>> {
    Ok(
      sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT LOWER(TRIM(email)) AS email FROM orders \
         WHERE email IS NOT NULL AND TRIM(email) <> '' ORDER BY email",
      )
      .fetch_all(&self.pool)
      .await?,
    )
  }
}
