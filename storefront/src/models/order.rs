// storefront/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Delivered,
  Failed,
  Refunded,
}

impl PaymentStatus {
  /// Delivery may only run once the gateway has confirmed the money.
  pub fn is_at_least_paid(self) -> bool {
    matches!(self, PaymentStatus::Paid | PaymentStatus::Delivered)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Delivered => "delivered",
      PaymentStatus::Failed => "failed",
      PaymentStatus::Refunded => "refunded",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "delivery_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
  Pending,
  Delivered,
  Failed,
}

impl DeliveryStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      DeliveryStatus::Pending => "pending",
      DeliveryStatus::Delivered => "delivered",
      DeliveryStatus::Failed => "failed",
    }
  }
}

/// What the customer bought. Stored as free text on the order because the
/// catalog is owned by the storefront; unknown values yield no in-game action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
  Rank,
  Crate,
  Currency,
}

impl ProductType {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "rank" | "ranks" => Some(ProductType::Rank),
      "crate" | "crates" | "key" | "keys" => Some(ProductType::Crate),
      "currency" | "money" => Some(ProductType::Currency),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub order_code: String,
  pub product_type: String,
  pub product_name: String,
  /// Whole rupees.
  pub amount: i64,
  pub minecraft_username: String,
  pub gift_recipient: Option<String>,
  pub email: Option<String>,
  pub gateway_order_id: Option<String>,
  pub gateway_payment_id: Option<String>,
  pub payment_status: PaymentStatus,
  pub delivery_status: DeliveryStatus,
  pub command_executed: Option<String>,
  pub error_log: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  /// The player who receives the item: the gift recipient when one was given.
  pub fn recipient(&self) -> &str {
    match self.gift_recipient.as_deref() {
      Some(gift) if !gift.trim().is_empty() => gift,
      _ => &self.minecraft_username,
    }
  }

  pub fn product(&self) -> Option<ProductType> {
    ProductType::parse(&self.product_type)
  }

  pub fn contact_email(&self) -> Option<&str> {
    self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
  }
}

/// Order as created by checkout, before the store assigns identity.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
  pub product_type: String,
  pub product_name: String,
  pub amount: i64,
  pub minecraft_username: String,
  pub gift_recipient: Option<String>,
  pub email: Option<String>,
  pub gateway_order_id: Option<String>,
}

/// Fields written after every delivery attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
  pub payment_status: PaymentStatus,
  pub delivery_status: DeliveryStatus,
  pub command_executed: Option<String>,
  pub error_log: Option<String>,
}

pub fn generate_order_code() -> String {
  let raw = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
  format!("AXS-{}", &raw[..12])
}
