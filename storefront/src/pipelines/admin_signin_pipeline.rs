// storefront/src/pipelines/admin_signin_pipeline.rs

use std::sync::Arc;

use chrono::Utc;
use orka::{ContextData, Orka, Pipeline, PipelineControl};
use serde_json::json;
use tracing::{error, event, info, instrument, warn, Level};

use crate::errors::{AppError, Result};
use crate::models::{AdminUser, LogCategory, NewAuditLog};
use crate::pipelines::common_steps::record_audit;
use crate::pipelines::contexts::{AdminSessionGrant, AdminSigninCtxData};
use crate::services::admin_session;
use crate::services::credentials::{self, CredentialCheck};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub fn register_admin_signin_pipeline(orka_instance: &Arc<Orka<AppError>>, _app_state: &AppState) {
  let legacy_only: Arc<dyn Fn(ContextData<AdminSigninCtxData>) -> bool + Send + Sync> =
    Arc::new(|ctx_data: ContextData<AdminSigninCtxData>| {
      let current = !ctx_data.read().needs_upgrade;
      current
    });

  let mut p = Pipeline::<AdminSigninCtxData, AppError>::new(&[
    ("validate_signin_input", false, None),
    ("fetch_admin", false, None),
    ("verify_credentials", false, None),
    ("upgrade_legacy_credential", true, Some(legacy_only)),
    ("issue_session_token", false, None),
  ]);

  p.on_root("validate_signin_input", validate_signin_input);
  p.on_root("fetch_admin", fetch_admin);
  p.on_root("verify_credentials", verify_credentials);
  p.on_root("upgrade_legacy_credential", upgrade_legacy_credential);
  p.on_root("issue_session_token", issue_session_token);

  orka_instance.register_pipeline(p);
  info!("Admin sign-in pipeline registered.");
}

fn signed_in_admin(ctx_data: &ContextData<AdminSigninCtxData>) -> Result<AdminUser> {
  let admin = ctx_data.read().admin.clone();
  admin.ok_or_else(|| {
    error!("Admin missing from sign-in context. Pipeline logic error.");
    AppError::Internal("Admin unexpectedly missing from sign-in context.".to_string())
  })
}

#[instrument(name = "admin_signin::validate_input", skip_all)]
async fn validate_signin_input(ctx_data: ContextData<AdminSigninCtxData>) -> Result<PipelineControl> {
  let (email, password_is_empty) = {
    let guard = ctx_data.read();
    (guard.email.trim().to_string(), guard.password.is_empty())
  };
  event!(Level::DEBUG, email = %email, "Validating admin sign-in input.");
  if email.is_empty() || !email.contains('@') {
    return Err(AppError::Validation("Valid email is required.".to_string()));
  }
  if password_is_empty {
    return Err(AppError::Validation("Password is required.".to_string()));
  }
  ctx_data.write().email = email;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "admin_signin::fetch_admin", skip_all)]
async fn fetch_admin(ctx_data: ContextData<AdminSigninCtxData>) -> Result<PipelineControl> {
  let (app_state, email) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.email.clone())
  };
  match app_state.store.find_admin_by_email(&email).await? {
    Some(admin) => {
      event!(Level::DEBUG, admin_id = %admin.id, "Admin account found.");
      ctx_data.write().admin = Some(admin);
      Ok(PipelineControl::Continue)
    }
    None => {
      warn!(email = %email, "Sign-in attempt for an unknown admin.");
      Err(AppError::Auth(INVALID_CREDENTIALS.to_string()))
    }
  }
}

#[instrument(name = "admin_signin::verify_credentials", skip_all)]
async fn verify_credentials(ctx_data: ContextData<AdminSigninCtxData>) -> Result<PipelineControl> {
  let admin = signed_in_admin(&ctx_data)?;
  let (app_state, password) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.password.clone())
  };

  let check = credentials::verify_credential(
    &admin.password_hash,
    &password,
    app_state.config.admin_migration_password.as_deref(),
  )?;
  match check {
    CredentialCheck::Accepted { needs_upgrade } => {
      info!(admin_id = %admin.id, needs_upgrade, "Admin credentials verified.");
      ctx_data.write().needs_upgrade = needs_upgrade;
      Ok(PipelineControl::Continue)
    }
    CredentialCheck::Rejected => {
      warn!(admin_id = %admin.id, "Admin password mismatch.");
      record_audit(
        &app_state,
        NewAuditLog::new(LogCategory::Admin, "Admin sign-in rejected").with_metadata(json!({ "admin_id": admin.id })),
      )
      .await;
      Err(AppError::Auth(INVALID_CREDENTIALS.to_string()))
    }
  }
}

/// Rehashes a legacy credential with Argon2. A failure here is logged and the
/// sign-in still succeeds; the upgrade is retried next time.
#[instrument(name = "admin_signin::upgrade_legacy_credential", skip_all)]
async fn upgrade_legacy_credential(ctx_data: ContextData<AdminSigninCtxData>) -> Result<PipelineControl> {
  let admin = signed_in_admin(&ctx_data)?;
  let (app_state, password) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.password.clone())
  };

  let upgraded = match credentials::hash_password(&password) {
    Ok(hash) => app_state.store.update_admin_password_hash(admin.id, &hash).await,
    Err(e) => Err(e),
  };
  match upgraded {
    Ok(()) => {
      info!(admin_id = %admin.id, "Legacy admin credential upgraded to Argon2.");
      record_audit(
        &app_state,
        NewAuditLog::new(LogCategory::Admin, "Legacy admin credential upgraded")
          .with_metadata(json!({ "admin_id": admin.id })),
      )
      .await;
    }
    Err(e) => warn!(admin_id = %admin.id, error = %e, "Could not upgrade legacy admin credential."),
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "admin_signin::issue_session_token", skip_all)]
async fn issue_session_token(ctx_data: ContextData<AdminSigninCtxData>) -> Result<PipelineControl> {
  let admin = signed_in_admin(&ctx_data)?;
  let app_state = ctx_data.read().app_state.clone();

  let ttl = chrono::Duration::from_std(app_state.config.admin_session_ttl)
    .map_err(|e| AppError::Config(format!("Invalid admin session lifetime: {}", e)))?;
  let (token, expires_at) = admin_session::issue_token(&app_state.config.admin_session_secret, admin.id, Utc::now(), ttl)?;

  {
    let mut guard = ctx_data.write();
    guard.session_token = Some(token);
    guard.expires_at = Some(expires_at);
    guard.password.clear();
  }
  record_audit(
    &app_state,
    NewAuditLog::new(LogCategory::Admin, "Admin signed in").with_metadata(json!({ "admin_id": admin.id })),
  )
  .await;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "admin_signin::sign_in", skip(app_state, password), err(Display))]
pub async fn admin_signin(app_state: &AppState, email: &str, password: &str) -> Result<AdminSessionGrant> {
  let ctx_data = ContextData::new(AdminSigninCtxData {
    app_state: app_state.clone(),
    email: email.to_string(),
    password: password.to_string(),
    admin: None,
    needs_upgrade: false,
    session_token: None,
    expires_at: None,
  });
  app_state.orka_instance.run(ctx_data.clone()).await?;

  let (admin, token, expires_at) = {
    let guard = ctx_data.read();
    (guard.admin.clone(), guard.session_token.clone(), guard.expires_at)
  };
  match (admin, token, expires_at) {
    (Some(admin), Some(token), Some(expires_at)) => Ok(AdminSessionGrant {
      admin_id: admin.id,
      email: admin.email,
      token,
      expires_at,
    }),
    _ => Err(AppError::Internal("Sign-in completed without issuing a session.".to_string())),
  }
}
