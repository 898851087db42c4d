// storefront/src/services/admin_session.rs

//! Stateless admin session tokens: `{admin_id}.{expires_unix}.{hmac_hex}`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::errors::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
  pub admin_id: Uuid,
  pub expires_at: DateTime<Utc>,
}

fn mac_hex(secret: &str, payload: &str) -> Result<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Internal(format!("Invalid session secret: {}", e)))?;
  mac.update(payload.as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn issue_token(secret: &str, admin_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> Result<(String, DateTime<Utc>)> {
  let expires_at = now + ttl;
  let payload = format!("{}.{}", admin_id, expires_at.timestamp());
  let signature = mac_hex(secret, &payload)?;
  Ok((format!("{}.{}", payload, signature), expires_at))
}

/// Every failure maps to the same `Auth` error.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<AdminSession> {
  let invalid = || AppError::Auth("Invalid or expired session token.".to_string());

  let mut parts = token.trim().splitn(3, '.');
  let (Some(id), Some(expires), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
    return Err(invalid());
  };
  let expected = mac_hex(secret, &format!("{}.{}", id, expires))?;
  if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
    return Err(invalid());
  }

  let admin_id = Uuid::parse_str(id).map_err(|_| invalid())?;
  let expires_at = expires
    .parse::<i64>()
    .ok()
    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
    .ok_or_else(invalid)?;
  if expires_at <= now {
    return Err(invalid());
  }
  Ok(AdminSession { admin_id, expires_at })
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "session-secret";

  #[test]
  fn issued_token_verifies_until_expiry() {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let (token, expires_at) = issue_token(SECRET, id, now, Duration::hours(12)).unwrap();
    let session = verify_token(SECRET, &token, now + Duration::hours(11)).unwrap();
    assert_eq!(session.admin_id, id);
    assert_eq!(session.expires_at.timestamp(), expires_at.timestamp());

    assert!(matches!(
      verify_token(SECRET, &token, now + Duration::hours(12) + Duration::seconds(1)),
      Err(AppError::Auth(_))
    ));
  }

  #[test]
  fn tampering_is_rejected() {
    let now = Utc::now();
    let (token, _) = issue_token(SECRET, Uuid::new_v4(), now, Duration::hours(1)).unwrap();

    let other_id = Uuid::new_v4();
    let forged = format!("{}{}", other_id, &token[36..]);
    assert!(verify_token(SECRET, &forged, now).is_err());

    let (id, rest) = token.split_once('.').unwrap();
    let (_, sig) = rest.split_once('.').unwrap();
    let extended = format!("{}.{}.{}", id, (now + Duration::days(365)).timestamp(), sig);
    assert!(verify_token(SECRET, &extended, now).is_err());

    assert!(verify_token("other-secret", &token, now).is_err());
    assert!(verify_token(SECRET, "not-a-token", now).is_err());
    assert!(verify_token(SECRET, "", now).is_err());
  }
}
