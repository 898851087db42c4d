// storefront/src/pipelines/delivery_pipeline.rs

//! Applies a paid order in-game.
//!
//! A broken player name or product is fatal and marks the delivery `failed`.
//! A console that cannot be reached is not: the order stays `pending` with
//! the reason in `error_log`, ready for an admin retry.

use std::sync::Arc;

use orka::{ContextData, Orka, Pipeline, PipelineControl};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::errors::{AppError, Result};
use crate::models::{DeliveryRecord, DeliveryStatus, LogCategory, NewAuditLog, NewEntitlement, Order, PaymentStatus};
use crate::pipelines::common_steps::{notify_quietly, record_audit};
use crate::pipelines::contexts::{DeliveryCtxData, DeliveryReport, DeliveryTrigger};
use crate::services::commands::{self, is_valid_player_name};
use crate::services::notifier::MessageKind;
use crate::state::AppState;

pub fn register_delivery_pipeline(orka_instance: &Arc<Orka<AppError>>, _app_state: &AppState) {
  let halted: Arc<dyn Fn(ContextData<DeliveryCtxData>) -> bool + Send + Sync> =
    Arc::new(|ctx_data: ContextData<DeliveryCtxData>| {
      let halted = ctx_data.read().fatal_error.is_some();
      halted
    });

  let mut p = Pipeline::<DeliveryCtxData, AppError>::new(&[
    ("load_order", false, None),
    ("resolve_recipient", false, None),
    ("synthesize_command", false, Some(halted.clone())),
    ("execute_command", false, Some(halted)),
    ("persist_outcome", false, None),
    ("write_audit_log", false, None),
    ("notify_customer", true, None),
  ]);

  p.on_root("load_order", load_order);
  p.on_root("resolve_recipient", resolve_recipient);
  p.on_root("synthesize_command", synthesize_command);
  p.on_root("execute_command", execute_command);
  p.on_root("persist_outcome", persist_outcome);
  p.on_root("write_audit_log", write_audit_log);
  p.on_root("notify_customer", notify_customer);

  orka_instance.register_pipeline(p);
  info!("Delivery pipeline registered.");
}

fn loaded_order(ctx_data: &ContextData<DeliveryCtxData>) -> Result<Order> {
  let order = ctx_data.read().order.clone();
  order.ok_or_else(|| {
    error!("Order missing from delivery context. Pipeline logic error.");
    AppError::Internal("Order unexpectedly missing from delivery context.".to_string())
  })
}

#[instrument(name = "delivery::load_order", skip_all, fields(order_code = tracing::field::Empty))]
async fn load_order(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let (app_state, order_code, trigger) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.order_code.clone(), guard.trigger.clone())
  };
  tracing::Span::current().record("order_code", order_code.as_str());

  let order = app_state
    .store
    .find_order_by_code(&order_code)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_code)))?;

  if !order.payment_status.is_at_least_paid() {
    warn!(payment_status = order.payment_status.as_str(), "Delivery requested for an unpaid order.");
    return Err(AppError::Validation(format!(
      "Order {} cannot be delivered while payment is '{}'.",
      order_code,
      order.payment_status.as_str()
    )));
  }

  let skip = trigger == DeliveryTrigger::Payment && order.delivery_status == DeliveryStatus::Delivered;
  {
    let mut guard = ctx_data.write();
    guard.order = Some(order);
    guard.skipped = skip;
  }
  if skip {
    info!("Order already delivered; payment trigger is a no-op.");
    return Ok(PipelineControl::Stop);
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "delivery::resolve_recipient", skip_all)]
async fn resolve_recipient(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let order = loaded_order(&ctx_data)?;
  let recipient = order.recipient().to_string();

  let mut guard = ctx_data.write();
  if !is_valid_player_name(&recipient) {
    warn!(recipient = %recipient, "Recipient is not a valid Minecraft username.");
    guard.fatal_error = Some(format!("Invalid Minecraft username: '{}'", recipient));
  }
  guard.recipient = Some(recipient);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "delivery::synthesize_command", skip_all)]
async fn synthesize_command(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let order = loaded_order(&ctx_data)?;
  let recipient = ctx_data.read().recipient.clone().unwrap_or_default();

  let synthesized = commands::synthesize(order.product(), &order.product_name, &recipient);
  let mut guard = ctx_data.write();
  match synthesized {
    Ok(Some(command)) => guard.command = Some(command),
    Ok(None) => {
      warn!(product_type = %order.product_type, "Product type has no in-game action.");
      guard.fatal_error = Some(format!("No in-game action for product type '{}'", order.product_type));
    }
    Err(e) => {
      warn!(error = %e, "Could not build a delivery command.");
      guard.fatal_error = Some(e.to_string());
    }
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "delivery::execute_command", skip_all)]
async fn execute_command(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let (app_state, command) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.command.clone())
  };
  let command = command
    .ok_or_else(|| AppError::Internal("Delivery command unexpectedly missing.".to_string()))?
    .to_string();

  info!(command = %command, "Sending delivery command to the game server.");
  let outcome = app_state.console.execute(&command).await;
  if outcome.success {
    info!(response = %outcome.message, "Delivery command succeeded.");
  } else {
    warn!(reason = %outcome.message, "Delivery command failed; order stays pending.");
  }
  ctx_data.write().outcome = Some(outcome);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "delivery::persist_outcome", skip_all)]
async fn persist_outcome(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let order = loaded_order(&ctx_data)?;
  let (app_state, recipient, command, outcome, fatal_error, now) = {
    let guard = ctx_data.read();
    (
      guard.app_state.clone(),
      guard.recipient.clone().unwrap_or_default(),
      guard.command.clone(),
      guard.outcome.clone(),
      guard.fatal_error.clone(),
      guard.now,
    )
  };

  let record = match (fatal_error, command, outcome) {
    (Some(reason), _, _) => DeliveryRecord {
      payment_status: order.payment_status,
      delivery_status: DeliveryStatus::Failed,
      command_executed: order.command_executed.clone(),
      error_log: Some(reason),
    },
    (None, Some(command), Some(outcome)) if outcome.success => {
      // The command already ran in-game, so the delivery is recorded whatever
      // happens to the expiry row.
      let mut error_log = None;
      if let Some(rank) = command.granted_rank() {
        let grant = NewEntitlement::rank_grant(&recipient, rank, now, order.id);
        match app_state.store.insert_entitlement(grant).await {
          Ok(entitlement) => {
            info!(rank, expires_at = %entitlement.expires_at, "Rank entitlement recorded.");
            ctx_data.write().entitlement = Some(entitlement);
          }
          Err(e) => {
            error!(rank, error = %e, "Rank granted in-game but its entitlement could not be saved.");
            let reason = format!("Rank granted in-game but its expiry record could not be saved: {}", e);
            error_log = Some(reason.clone());
            ctx_data.write().entitlement_error = Some(reason);
          }
        }
        count_rank_grants(&ctx_data, &app_state, &order).await;
      }
      DeliveryRecord {
        payment_status: PaymentStatus::Delivered,
        delivery_status: DeliveryStatus::Delivered,
        command_executed: Some(command.to_string()),
        error_log,
      }
    }
    (None, Some(command), Some(outcome)) => DeliveryRecord {
      payment_status: order.payment_status,
      delivery_status: DeliveryStatus::Pending,
      command_executed: Some(command.to_string()),
      error_log: Some(outcome.message),
    },
    (None, _, _) => {
      error!("Delivery reached persistence without a command outcome.");
      return Err(AppError::Internal("Delivery outcome unexpectedly missing.".to_string()));
    }
  };

  app_state.store.record_delivery_attempt(order.id, &record).await?;
  info!(
    payment_status = record.payment_status.as_str(),
    delivery_status = record.delivery_status.as_str(),
    "Delivery attempt persisted."
  );
  Ok(PipelineControl::Continue)
}

async fn count_rank_grants(ctx_data: &ContextData<DeliveryCtxData>, app_state: &AppState, order: &Order) {
  match app_state.store.entitlements_for_order(order.id).await {
    Ok(grants) => {
      if grants.len() > 1 {
        warn!(count = grants.len(), "Order now holds more than one rank grant.");
      }
      ctx_data.write().rank_grants = grants.len();
    }
    Err(e) => warn!(error = %e, "Could not count rank grants for the order."),
  }
}

#[instrument(name = "delivery::write_audit_log", skip_all)]
async fn write_audit_log(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let order = loaded_order(&ctx_data)?;
  let entry = {
    let guard = ctx_data.read();
    let admin_id = match &guard.trigger {
      DeliveryTrigger::AdminRetry { admin_id } => Some(admin_id.to_string()),
      DeliveryTrigger::Payment => None,
    };
    let command = guard.command.as_ref().map(|c| c.to_string());
    let player = guard.recipient.clone().unwrap_or_default();
    let (category, message, detail) = match (&guard.fatal_error, &guard.outcome) {
      (None, Some(outcome)) if outcome.success && guard.entitlement_error.is_some() => (
        LogCategory::Error,
        format!("Delivered {} to {} without an expiry record", order.product_name, player),
        guard.entitlement_error.clone().unwrap_or_default(),
      ),
      (Some(reason), _) => (
        LogCategory::Error,
        format!("Delivery failed for order {}: {}", order.order_code, reason),
        reason.clone(),
      ),
      (None, Some(outcome)) if outcome.success => (
        LogCategory::Delivery,
        format!("Delivered {} to {}", order.product_name, player),
        outcome.message.clone(),
      ),
      (None, Some(outcome)) => (
        LogCategory::Error,
        format!("Delivery pending for order {}: {}", order.order_code, outcome.message),
        outcome.message.clone(),
      ),
      (None, None) => (
        LogCategory::Error,
        format!("Delivery for order {} produced no outcome", order.order_code),
        String::new(),
      ),
    };
    NewAuditLog::new(category, message)
      .for_order(order.id)
      .with_metadata(json!({
        "order_code": order.order_code,
        "player": player,
        "product_name": order.product_name,
        "command": command,
        "trigger": guard.trigger.as_str(),
        "admin_id": admin_id,
        "rank_grants": guard.rank_grants,
        "detail": detail,
      }))
  };
  let app_state = ctx_data.read().app_state.clone();
  record_audit(&app_state, entry).await;
  Ok(PipelineControl::Continue)
}

#[instrument(name = "delivery::notify_customer", skip_all)]
async fn notify_customer(ctx_data: ContextData<DeliveryCtxData>) -> Result<PipelineControl> {
  let order = loaded_order(&ctx_data)?;
  let Some(email) = order.contact_email().map(str::to_string) else {
    return Ok(PipelineControl::Continue);
  };
  let (app_state, status, recipient, fatal_error) = {
    let guard = ctx_data.read();
    (
      guard.app_state.clone(),
      guard.final_status(),
      guard.recipient.clone().unwrap_or_default(),
      guard.fatal_error.clone(),
    )
  };

  let message = match status {
    DeliveryStatus::Delivered => Some((
      MessageKind::Receipt,
      json!({
        "order_code": order.order_code,
        "product_name": order.product_name,
        "player": recipient,
        "amount": order.amount,
      }),
    )),
    DeliveryStatus::Failed => Some((
      MessageKind::Failed,
      json!({
        "order_code": order.order_code,
        "product_name": order.product_name,
        "player": recipient,
        "reason": fatal_error,
      }),
    )),
    DeliveryStatus::Pending => None,
  };

  if let Some((kind, payload)) = message {
    let sent = notify_quietly(&app_state, kind, &email, payload).await;
    ctx_data.write().customer_notified = sent;
  }
  Ok(PipelineControl::Continue)
}

/// Runs the delivery pipeline for one order and summarizes what happened.
#[instrument(name = "delivery::deliver", skip(app_state, trigger), fields(trigger = trigger.as_str()), err(Display))]
pub async fn deliver(app_state: &AppState, order_code: &str, trigger: DeliveryTrigger) -> Result<DeliveryReport> {
  let ctx_data = ContextData::new(DeliveryCtxData::new(app_state.clone(), order_code, trigger));
  app_state.orka_instance.run(ctx_data.clone()).await?;

  let guard = ctx_data.read();
  let command = match (&guard.command, &guard.order) {
    (Some(command), _) => Some(command.to_string()),
    (None, Some(order)) if guard.skipped => order.command_executed.clone(),
    _ => None,
  };
  let message = match (&guard.fatal_error, &guard.outcome) {
    (Some(reason), _) => Some(reason.clone()),
    (None, Some(_)) if guard.entitlement_error.is_some() => guard.entitlement_error.clone(),
    (None, Some(outcome)) => Some(outcome.message.clone()),
    (None, None) => None,
  };
  Ok(DeliveryReport {
    order_code: order_code.to_string(),
    status: guard.final_status(),
    command,
    message,
    entitlement_expires_at: guard.entitlement.as_ref().map(|e| e.expires_at),
    rank_grants: guard.rank_grants,
    already_delivered: guard.skipped,
  })
}
