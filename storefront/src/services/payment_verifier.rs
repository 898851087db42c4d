// storefront/src/services/payment_verifier.rs

//! Gateway callback signatures.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument};

use crate::errors::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// What the checkout page posts back once the gateway captures a payment.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GatewayCallback {
  /// Our own order code, echoed back by the checkout widget.
  pub order_code: String,
  pub gateway_order_id: String,
  pub gateway_payment_id: String,
  pub signature: String,
}

/// Lowercase hex HMAC-SHA256 of `"{order}|{payment}"`.
pub fn compute_signature(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> Result<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| AppError::Internal(format!("Invalid payment key secret: {}", e)))?;
  mac.update(gateway_order_id.as_bytes());
  mac.update(b"|");
  mac.update(gateway_payment_id.as_bytes());
  Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Exact, case-sensitive comparison of the supplied signature.
#[instrument(name = "payment_verifier::signature_matches", skip_all, fields(gateway_order_id = %gateway_order_id))]
pub fn signature_matches(
  secret: &str,
  gateway_order_id: &str,
  gateway_payment_id: &str,
  supplied: &str,
) -> Result<bool> {
  let expected = compute_signature(secret, gateway_order_id, gateway_payment_id)?;
  let matches: bool = expected.as_bytes().ct_eq(supplied.as_bytes()).into();
  debug!(matches, "Gateway signature checked.");
  Ok(matches)
}
