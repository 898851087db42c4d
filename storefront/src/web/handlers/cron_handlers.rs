// storefront/src/web/handlers/cron_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use super::admin_handlers::bearer_token;
use crate::errors::AppError;
use crate::pipelines::run_rank_sweep;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct SweepQuery {
  /// Evaluates expiry as of this instant instead of the current time.
  pub now: Option<DateTime<Utc>>,
}

#[instrument(name = "handler::rank_sweep", skip(app_state, req, query))]
pub async fn rank_sweep_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  query: web::Query<SweepQuery>,
) -> Result<HttpResponse, AppError> {
  let Some(secret) = app_state.config.cron_secret.as_deref() else {
    warn!("Sweep trigger called but CRON_SECRET is not configured.");
    return Err(AppError::NotFound("Sweep trigger is disabled.".to_string()));
  };
  let authorized = bearer_token(&req).is_some_and(|token| bool::from(token.as_bytes().ct_eq(secret.as_bytes())));
  if !authorized {
    warn!("Sweep trigger called with a missing or wrong secret.");
    return Err(AppError::Auth("Invalid cron secret.".to_string()));
  }

  let summary = run_rank_sweep(app_state.get_ref(), query.now).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "summary": summary })))
}
