// storefront/src/pipelines/sweeper_pipeline.rs

//! Revokes expired ranks and reminds players two days before expiry.
//! Entitlements are handled strictly one after another.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use orka::{ContextData, Orka, Pipeline, PipelineControl};
use serde_json::json;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::errors::{AppError, Result};
use crate::models::{ActiveEntitlement, LogCategory, NewAuditLog};
use crate::pipelines::common_steps::{notify_quietly, record_audit};
use crate::pipelines::contexts::{SweepCtxData, SweepSummary};
use crate::services::commands::revoke_rank;
use crate::services::notifier::MessageKind;
use crate::state::AppState;

/// Days before expiry on which the reminder goes out.
pub const REMINDER_DAYS_LEFT: i64 = 2;

pub fn register_sweeper_pipeline(orka_instance: &Arc<Orka<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<SweepCtxData, AppError>::new(&[
    ("load_active_entitlements", false, None),
    ("reconcile_entitlements", false, None),
    ("record_sweep_summary", false, None),
  ]);

  p.on_root("load_active_entitlements", load_active_entitlements);
  p.on_root("reconcile_entitlements", reconcile_entitlements);
  p.on_root("record_sweep_summary", record_sweep_summary);

  orka_instance.register_pipeline(p);
  info!("Rank sweep pipeline registered.");
}

#[instrument(name = "sweep::load_active_entitlements", skip_all)]
async fn load_active_entitlements(ctx_data: ContextData<SweepCtxData>) -> Result<PipelineControl> {
  let app_state = ctx_data.read().app_state.clone();
  let entitlements = app_state.store.active_entitlements().await?;
  info!(count = entitlements.len(), "Loaded active rank entitlements.");
  ctx_data.write().entitlements = entitlements;
  Ok(PipelineControl::Continue)
}

enum Handled {
  Revoked,
  RevokeFailed,
  Reminded,
  Untouched,
}

async fn revoke_expired(app_state: &AppState, entitlement: &ActiveEntitlement, now: DateTime<Utc>) -> Result<Handled> {
  let metadata = json!({
    "player": entitlement.minecraft_username,
    "rank_name": entitlement.rank_name,
    "expires_at": entitlement.expires_at,
    "entitlement_id": entitlement.id,
  });

  let command = match revoke_rank(&entitlement.minecraft_username, &entitlement.rank_name) {
    Ok(command) => command.to_string(),
    Err(e) => {
      warn!(error = %e, "Stored entitlement cannot produce a revoke command.");
      record_audit(
        app_state,
        NewAuditLog::new(LogCategory::Error, format!("Rank revoke skipped: {}", e)).with_metadata(metadata),
      )
      .await;
      return Ok(Handled::RevokeFailed);
    }
  };

  let outcome = app_state.console.execute(&command).await;
  if !outcome.success {
    warn!(reason = %outcome.message, "Rank revoke failed; entitlement stays active.");
    record_audit(
      app_state,
      NewAuditLog::new(
        LogCategory::Error,
        format!(
          "Failed to revoke {} from {}: {}",
          entitlement.rank_name, entitlement.minecraft_username, outcome.message
        ),
      )
      .with_metadata(metadata),
    )
    .await;
    return Ok(Handled::RevokeFailed);
  }

  app_state.store.deactivate_entitlement(entitlement.id, now).await?;
  info!("Expired rank revoked.");
  let mut entry = NewAuditLog::new(
    LogCategory::RankExpiry,
    format!("Revoked {} from {}", entitlement.rank_name, entitlement.minecraft_username),
  )
  .with_metadata(metadata);
  if let Some(order_id) = entitlement.order_id {
    entry = entry.for_order(order_id);
  }
  record_audit(app_state, entry).await;
  Ok(Handled::Revoked)
}

async fn remind_owner(app_state: &AppState, entitlement: &ActiveEntitlement, days_left: i64) -> Result<Handled> {
  let Some(order_id) = entitlement.order_id else {
    debug!("Entitlement has no originating order; no one to remind.");
    return Ok(Handled::Untouched);
  };
  let email = app_state
    .store
    .find_order_by_id(order_id)
    .await?
    .and_then(|order| order.contact_email().map(str::to_string));
  let Some(email) = email else {
    debug!("Originating order has no contact email; reminder skipped.");
    return Ok(Handled::Untouched);
  };

  let payload = json!({
    "player": entitlement.minecraft_username,
    "rank_name": entitlement.rank_name,
    "expires_at": entitlement.expires_at,
    "days_left": days_left,
  });
  if !notify_quietly(app_state, MessageKind::ExpiryReminder, &email, payload).await {
    return Ok(Handled::Untouched);
  }
  record_audit(
    app_state,
    NewAuditLog::new(
      LogCategory::Reminder,
      format!("Expiry reminder sent for {} ({})", entitlement.minecraft_username, entitlement.rank_name),
    )
    .for_order(order_id)
    .with_metadata(json!({ "days_left": days_left, "rank_name": entitlement.rank_name })),
  )
  .await;
  Ok(Handled::Reminded)
}

/// A store error on one entitlement is logged and counted; the sweep moves on.
async fn sweep_failed(app_state: &AppState, entitlement: &ActiveEntitlement, e: &AppError) {
  warn!(error = %e, "Entitlement could not be reconciled; left for the next sweep.");
  let mut entry = NewAuditLog::new(
    LogCategory::Error,
    format!(
      "Rank sweep failed for {} ({}): {}",
      entitlement.minecraft_username, entitlement.rank_name, e
    ),
  )
  .with_metadata(json!({
    "player": entitlement.minecraft_username,
    "rank_name": entitlement.rank_name,
    "expires_at": entitlement.expires_at,
    "entitlement_id": entitlement.id,
  }));
  if let Some(order_id) = entitlement.order_id {
    entry = entry.for_order(order_id);
  }
  record_audit(app_state, entry).await;
}

#[instrument(name = "sweep::reconcile_entitlements", skip_all)]
async fn reconcile_entitlements(ctx_data: ContextData<SweepCtxData>) -> Result<PipelineControl> {
  let (app_state, now, entitlements) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.now, guard.entitlements.clone())
  };

  let mut summary = SweepSummary::default();
  for entitlement in &entitlements {
    summary.processed += 1;
    let span = tracing::info_span!(
      "sweep::entitlement",
      player = %entitlement.minecraft_username,
      rank = %entitlement.rank_name
    );
    let days_left = entitlement.days_left_at(now);
    let handled = async {
      if entitlement.is_expired_at(now) {
        revoke_expired(&app_state, entitlement, now).await
      } else if days_left == REMINDER_DAYS_LEFT {
        remind_owner(&app_state, entitlement, days_left).await
      } else {
        Ok(Handled::Untouched)
      }
    }
    .instrument(span.clone())
    .await;

    let handled = match handled {
      Ok(handled) => handled,
      Err(e) => {
        sweep_failed(&app_state, entitlement, &e).instrument(span).await;
        Handled::RevokeFailed
      }
    };
    match handled {
      Handled::Revoked => summary.revoked += 1,
      Handled::RevokeFailed => summary.revoke_failures += 1,
      Handled::Reminded => summary.reminders += 1,
      Handled::Untouched => {}
    }
  }

  ctx_data.write().summary = summary;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "sweep::record_sweep_summary", skip_all)]
async fn record_sweep_summary(ctx_data: ContextData<SweepCtxData>) -> Result<PipelineControl> {
  let (app_state, summary, now) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.summary.clone(), guard.now)
  };
  info!(
    processed = summary.processed,
    revoked = summary.revoked,
    reminders = summary.reminders,
    revoke_failures = summary.revoke_failures,
    "Rank sweep finished."
  );
  record_audit(
    &app_state,
    NewAuditLog::new(
      LogCategory::Sweep,
      format!(
        "Rank sweep processed {} entitlements: {} revoked, {} reminders, {} failures",
        summary.processed, summary.revoked, summary.reminders, summary.revoke_failures
      ),
    )
    .with_metadata(json!({
      "processed": summary.processed,
      "revoked": summary.revoked,
      "reminders": summary.reminders,
      "revoke_failures": summary.revoke_failures,
      "now": now,
    })),
  )
  .await;
  Ok(PipelineControl::Continue)
}

/// Runs one sweep. `now` defaults to the current time.
#[instrument(name = "sweep::run_rank_sweep", skip(app_state), err(Display))]
pub async fn run_rank_sweep(app_state: &AppState, now: Option<DateTime<Utc>>) -> Result<SweepSummary> {
  let ctx_data = ContextData::new(SweepCtxData {
    app_state: app_state.clone(),
    now: now.unwrap_or_else(Utc::now),
    entitlements: Vec::new(),
    summary: SweepSummary::default(),
  });
  app_state.orka_instance.run(ctx_data.clone()).await?;
  let summary = ctx_data.read().summary.clone();
  Ok(summary)
}

/// Sweeps every `every` until the task is dropped. The first sweep runs one
/// full interval after start.
pub async fn run_sweep_timer(app_state: AppState, every: std::time::Duration) {
  let mut ticker = tokio::time::interval(every);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  ticker.tick().await;
  loop {
    ticker.tick().await;
    if let Err(e) = run_rank_sweep(&app_state, None).await {
      tracing::error!(error = %e, "Scheduled rank sweep failed.");
    }
  }
}
