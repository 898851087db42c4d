// storefront/src/pipelines/contexts.rs

//! Data carried through each pipeline. Handlers receive these wrapped in
//! `orka::ContextData`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ActiveEntitlement, AdminUser, DeliveryStatus, Order, PaymentStatus};
use crate::rcon::DeliveryOutcome;
use crate::services::commands::GameCommand;
use crate::services::payment_verifier::GatewayCallback;
use crate::state::AppState;

// --- Payment callback ---

#[derive(Clone)]
pub struct PaymentCtxData {
  pub app_state: AppState,
  pub callback: GatewayCallback,
  pub order: Option<Order>,
  /// Set when the gateway repeats a callback for an order we already fulfilled.
  pub already_delivered: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
  pub order_code: String,
  pub payment_status: PaymentStatus,
  pub delivery_status: DeliveryStatus,
}

// --- Delivery ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTrigger {
  Payment,
  AdminRetry { admin_id: Uuid },
}

impl DeliveryTrigger {
  pub fn as_str(&self) -> &'static str {
    match self {
      DeliveryTrigger::Payment => "payment",
      DeliveryTrigger::AdminRetry { .. } => "admin_retry",
    }
  }
}

#[derive(Clone)]
pub struct DeliveryCtxData {
  pub app_state: AppState,
  pub order_code: String,
  pub trigger: DeliveryTrigger,
  pub now: DateTime<Utc>,

  pub order: Option<Order>,
  pub recipient: Option<String>,
  pub command: Option<GameCommand>,
  pub outcome: Option<DeliveryOutcome>,
  /// Player or product problems that no retry can fix.
  pub fatal_error: Option<String>,
  pub entitlement: Option<ActiveEntitlement>,
  /// The rank went through in-game but its expiry row was not saved.
  pub entitlement_error: Option<String>,
  /// Rank rows on record for this order after the attempt.
  pub rank_grants: usize,
  pub customer_notified: bool,
  /// Set when a payment callback hits an order that was already delivered.
  pub skipped: bool,
}

impl DeliveryCtxData {
  pub fn new(app_state: AppState, order_code: impl Into<String>, trigger: DeliveryTrigger) -> Self {
    Self {
      app_state,
      order_code: order_code.into(),
      trigger,
      now: Utc::now(),
      order: None,
      recipient: None,
      command: None,
      outcome: None,
      fatal_error: None,
      entitlement: None,
      entitlement_error: None,
      rank_grants: 0,
      customer_notified: false,
      skipped: false,
    }
  }

  pub fn final_status(&self) -> DeliveryStatus {
    if self.fatal_error.is_some() {
      DeliveryStatus::Failed
    } else if self.skipped || self.outcome.as_ref().is_some_and(|o| o.success) {
      DeliveryStatus::Delivered
    } else {
      DeliveryStatus::Pending
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
  pub order_code: String,
  pub status: DeliveryStatus,
  pub command: Option<String>,
  /// Console response on success, error text otherwise.
  pub message: Option<String>,
  pub entitlement_expires_at: Option<DateTime<Utc>>,
  /// Rank grants recorded against the order, counting earlier retries.
  pub rank_grants: usize,
  pub already_delivered: bool,
}

// --- Rank sweep ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
  pub processed: usize,
  pub revoked: usize,
  pub reminders: usize,
  pub revoke_failures: usize,
}

#[derive(Clone)]
pub struct SweepCtxData {
  pub app_state: AppState,
  pub now: DateTime<Utc>,
  pub entitlements: Vec<ActiveEntitlement>,
  pub summary: SweepSummary,
}

// --- Admin sign-in ---

#[derive(Clone)]
pub struct AdminSigninCtxData {
  pub app_state: AppState,
  pub email: String,
  pub password: String,
  pub admin: Option<AdminUser>,
  pub needs_upgrade: bool,
  pub session_token: Option<String>,
  pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSessionGrant {
  pub admin_id: Uuid,
  pub email: String,
  pub token: String,
  pub expires_at: DateTime<Utc>,
}
