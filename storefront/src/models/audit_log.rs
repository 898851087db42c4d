// storefront/src/models/audit_log.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
  Payment,
  /// Forged or tampered gateway callback.
  Integrity,
  /// Valid signature but the referenced data is missing or inconsistent.
  Consistency,
  Delivery,
  Error,
  RankExpiry,
  Reminder,
  Sweep,
  Admin,
  Email,
}

impl LogCategory {
  pub fn as_str(self) -> &'static str {
    match self {
      LogCategory::Payment => "payment",
      LogCategory::Integrity => "integrity",
      LogCategory::Consistency => "consistency",
      LogCategory::Delivery => "delivery",
      LogCategory::Error => "error",
      LogCategory::RankExpiry => "rank_expiry",
      LogCategory::Reminder => "reminder",
      LogCategory::Sweep => "sweep",
      LogCategory::Admin => "admin",
      LogCategory::Email => "email",
    }
  }
}

/// Row of the append-only `logs` collection.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLogEntry {
  pub id: Uuid,
  pub category: String,
  pub message: String,
  pub metadata: Json<JsonValue>,
  pub order_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
  pub category: LogCategory,
  pub message: String,
  pub metadata: JsonValue,
  pub order_id: Option<Uuid>,
}

impl NewAuditLog {
  pub fn new(category: LogCategory, message: impl Into<String>) -> Self {
    Self {
      category,
      message: message.into(),
      metadata: JsonValue::Object(Default::default()),
      order_id: None,
    }
  }

  pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
    self.metadata = metadata;
    self
  }

  pub fn for_order(mut self, order_id: Uuid) -> Self {
    self.order_id = Some(order_id);
    self
  }
}
