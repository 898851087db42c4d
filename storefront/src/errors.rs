// storefront/src/errors.rs

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use orka::OrkaError;

/// Message shown to callers for every integrity or consistency failure, so the
/// response never reveals which check rejected the request.
pub const PAYMENT_VERIFICATION_FAILED: &str = "Your payment could not be verified.";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  /// Bad or missing gateway signature. The detail is for server-side logs only.
  #[error("Payment verification failed: {0}")]
  PaymentVerification(String),

  /// A correctly signed callback referenced an order we do not know about.
  #[error("Order not found: {0}")]
  OrderNotFound(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("Notification Error: {0}")]
  Notification(String),

  #[error("Orka Workflow Error: {source}")]
  Workflow {
    #[from]
    source: OrkaError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn error_response(&self) -> HttpResponse {
    tracing::error!(application_error = %self, "Responding with error");
    match self {
      AppError::Validation(m) => HttpResponse::BadRequest().json(json!({"success": false, "error": m})),
      AppError::Auth(_) => HttpResponse::Unauthorized().json(json!({"success": false, "error": "Unauthorized"})),
      AppError::PaymentVerification(_) | AppError::OrderNotFound(_) => {
        HttpResponse::BadRequest().json(json!({"success": false, "error": PAYMENT_VERIFICATION_FAILED}))
      }
      AppError::NotFound(m) => HttpResponse::NotFound().json(json!({"success": false, "error": m})),
      AppError::Sqlx(_) | AppError::Migrate(_) => {
        HttpResponse::InternalServerError().json(json!({"success": false, "error": "Database operation failed"}))
      }
      AppError::Config(_)
      | AppError::Notification(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => {
        HttpResponse::InternalServerError().json(json!({"success": false, "error": "An internal error occurred"}))
      }
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;
  use actix_web::http::StatusCode;

  async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
    let resp = err.error_response();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[actix_rt::test]
  async fn integrity_and_consistency_errors_share_one_message() {
    let (s1, b1) = body_of(AppError::PaymentVerification("hmac mismatch".into())).await;
    let (s2, b2) = body_of(AppError::OrderNotFound("AXS-123".into())).await;
    assert_eq!(s1, StatusCode::BAD_REQUEST);
    assert_eq!(s1, s2);
    assert_eq!(b1, b2);
    assert!(!b1.to_string().contains("hmac"));
    assert!(!b2.to_string().contains("AXS-123"));
  }

  #[actix_rt::test]
  async fn validation_errors_keep_their_message() {
    let (status, body) = body_of(AppError::Validation("Invalid Minecraft username".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid Minecraft username");
  }

  #[actix_rt::test]
  async fn internal_details_are_not_exposed() {
    let (status, body) = body_of(AppError::Internal("connection refused at 10.0.0.4".into())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.to_string().contains("10.0.0.4"));
  }
}
