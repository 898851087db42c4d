// storefront/src/web/handlers/admin_handlers.rs

use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipelines::{admin_signin, deliver, DeliveryTrigger};
use crate::services::admin_session;
use crate::services::broadcast::send_bulk_message;
use crate::state::AppState;

pub const DEFAULT_LOG_LIMIT: i64 = 50;
pub const MAX_LOG_LIMIT: i64 = 500;

/// An admin whose bearer session token checked out.
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin {
  pub admin_id: Uuid,
}

/// Reads `Authorization: Bearer <token>`, if present.
pub(crate) fn bearer_token(req: &HttpRequest) -> Option<&str> {
  req
    .headers()
    .get(actix_web::http::header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|token| !token.is_empty())
}

impl FromRequest for AuthenticatedAdmin {
  type Error = AppError;
  type Future = futures_util::future::Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let Some(app_state) = req.app_data::<web::Data<AppState>>() else {
      return futures_util::future::ready(Err(AppError::Internal("Application state is not configured.".to_string())));
    };
    let Some(token) = bearer_token(req) else {
      warn!("Admin request without a bearer token.");
      return futures_util::future::ready(Err(AppError::Auth("Missing admin session token.".to_string())));
    };
    let result = admin_session::verify_token(&app_state.config.admin_session_secret, token, Utc::now())
      .map(|session| AuthenticatedAdmin {
        admin_id: session.admin_id,
      });
    if result.is_err() {
      warn!("Admin request with an invalid or expired session token.");
    }
    futures_util::future::ready(result)
  }
}

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
pub struct AdminSigninRequestPayload {
  pub email: String,
  pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LogsQuery {
  pub limit: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub struct BulkEmailRequestPayload {
  pub subject: String,
  pub body: String,
}

// --- Handler Implementations ---

#[instrument(name = "handler::admin_signin", skip(app_state, req_payload), fields(req_email = %req_payload.email))]
pub async fn admin_signin_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<AdminSigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let grant = admin_signin(app_state.get_ref(), &req_payload.email, &req_payload.password).await?;
  info!(admin_id = %grant.admin_id, "Admin signed in.");
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "adminId": grant.admin_id,
    "email": grant.email,
    "token": grant.token,
    "expiresAt": grant.expires_at,
  })))
}

#[instrument(name = "handler::retry_delivery", skip(app_state, admin), fields(admin_id = %admin.admin_id))]
pub async fn retry_delivery_handler(
  app_state: web::Data<AppState>,
  admin: AuthenticatedAdmin,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order_code = path.into_inner();
  let report = deliver(
    app_state.get_ref(),
    &order_code,
    DeliveryTrigger::AdminRetry {
      admin_id: admin.admin_id,
    },
  )
  .await?;
  info!(order_code = %report.order_code, status = report.status.as_str(), "Admin delivery retry finished.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "delivery": report })))
}

#[instrument(name = "handler::recent_logs", skip(app_state, admin, query), fields(admin_id = %admin.admin_id))]
pub async fn recent_logs_handler(
  app_state: web::Data<AppState>,
  admin: AuthenticatedAdmin,
  query: web::Query<LogsQuery>,
) -> Result<HttpResponse, AppError> {
  let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
  let logs = app_state.store.recent_logs(limit).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "logs": logs })))
}

#[instrument(name = "handler::bulk_email", skip(app_state, admin, req_payload), fields(admin_id = %admin.admin_id))]
pub async fn bulk_email_handler(
  app_state: web::Data<AppState>,
  admin: AuthenticatedAdmin,
  req_payload: web::Json<BulkEmailRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let report = send_bulk_message(
    app_state.get_ref(),
    admin.admin_id,
    &req_payload.subject,
    &req_payload.body,
  )
  .await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "report": report })))
}
