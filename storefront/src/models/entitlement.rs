// storefront/src/models/entitlement.rs

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Length of every rank purchase.
pub const RANK_TERM_DAYS: i64 = 30;

/// A time-limited rank grant, stored in `active_ranks`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActiveEntitlement {
  pub id: Uuid,
  pub minecraft_username: String,
  pub rank_name: String,
  pub granted_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  pub active: bool,
  pub revoked_at: Option<DateTime<Utc>>,
  /// Lookup only; the row outlives the order.
  pub order_id: Option<Uuid>,
}

impl ActiveEntitlement {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.expires_at <= now
  }

  /// Whole UTC calendar days between today and the expiry date.
  pub fn days_left_at(&self, now: DateTime<Utc>) -> i64 {
    (self.expires_at.date_naive() - now.date_naive()).num_days()
  }
}

#[derive(Debug, Clone)]
pub struct NewEntitlement {
  pub minecraft_username: String,
  pub rank_name: String,
  pub granted_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
  pub order_id: Option<Uuid>,
}

impl NewEntitlement {
  pub fn rank_grant(player: &str, rank: &str, granted_at: DateTime<Utc>, order_id: Uuid) -> Self {
    Self {
      minecraft_username: player.to_string(),
      rank_name: rank.to_string(),
      granted_at,
      expires_at: granted_at + Duration::days(RANK_TERM_DAYS),
      order_id: Some(order_id),
    }
  }
}
