// storefront/src/pipelines/payment_pipeline.rs

//! Trusts a gateway callback only after its signature checks out, then marks
//! the order paid. Delivery runs afterwards in its own pipeline, and its
//! failures never fail the callback.

use std::sync::Arc;

use orka::{ContextData, Orka, Pipeline, PipelineControl, PipelineResult};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::errors::{AppError, Result};
use crate::models::{DeliveryStatus, LogCategory, NewAuditLog, Order, PaymentStatus};
use crate::pipelines::common_steps::record_audit;
use crate::pipelines::contexts::{DeliveryTrigger, PaymentConfirmation, PaymentCtxData};
use crate::pipelines::delivery_pipeline::deliver;
use crate::services::payment_verifier::{signature_matches, GatewayCallback};
use crate::state::AppState;

pub fn register_payment_pipeline(orka_instance: &Arc<Orka<AppError>>, _app_state: &AppState) {
  let mut p = Pipeline::<PaymentCtxData, AppError>::new(&[
    ("verify_signature", false, None),
    ("load_order", false, None),
    ("mark_order_paid", false, None),
  ]);

  p.on_root("verify_signature", verify_signature);
  p.on_root("load_order", load_order);
  p.on_root("mark_order_paid", mark_order_paid);

  orka_instance.register_pipeline(p);
  info!("Payment pipeline registered.");
}

#[instrument(name = "payment::verify_signature", skip_all)]
async fn verify_signature(ctx_data: ContextData<PaymentCtxData>) -> Result<PipelineControl> {
  let (app_state, callback) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.callback.clone())
  };

  if [&callback.order_code, &callback.gateway_order_id, &callback.gateway_payment_id, &callback.signature]
    .iter()
    .any(|v| v.trim().is_empty())
  {
    warn!("Payment callback is missing required fields.");
    return Err(AppError::Validation("Missing payment verification fields.".to_string()));
  }

  let valid = signature_matches(
    &app_state.config.payment_key_secret,
    &callback.gateway_order_id,
    &callback.gateway_payment_id,
    &callback.signature,
  )?;
  if !valid {
    warn!(gateway_order_id = %callback.gateway_order_id, "Payment signature mismatch.");
    record_audit(
      &app_state,
      NewAuditLog::new(LogCategory::Integrity, "Payment signature mismatch").with_metadata(json!({
        "order_code": callback.order_code,
        "gateway_order_id": callback.gateway_order_id,
        "gateway_payment_id": callback.gateway_payment_id,
      })),
    )
    .await;
    return Err(AppError::PaymentVerification("signature mismatch".to_string()));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment::load_order", skip_all)]
async fn load_order(ctx_data: ContextData<PaymentCtxData>) -> Result<PipelineControl> {
  let (app_state, callback) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.callback.clone())
  };

  let Some(order) = app_state.store.find_order_by_code(&callback.order_code).await? else {
    warn!(order_code = %callback.order_code, "Signed payment callback for an unknown order.");
    record_audit(
      &app_state,
      NewAuditLog::new(LogCategory::Consistency, "Signed payment callback for an unknown order").with_metadata(
        json!({
          "order_code": callback.order_code,
          "gateway_order_id": callback.gateway_order_id,
          "gateway_payment_id": callback.gateway_payment_id,
        }),
      ),
    )
    .await;
    return Err(AppError::OrderNotFound(callback.order_code));
  };

  if let Some(expected) = order.gateway_order_id.as_deref() {
    if expected != callback.gateway_order_id {
      warn!(order_code = %order.order_code, "Gateway order reference does not match the stored order.");
      record_audit(
        &app_state,
        NewAuditLog::new(LogCategory::Integrity, "Gateway order reference mismatch")
          .for_order(order.id)
          .with_metadata(json!({
            "order_code": order.order_code,
            "expected_gateway_order_id": expected,
            "gateway_order_id": callback.gateway_order_id,
          })),
      )
      .await;
      return Err(AppError::PaymentVerification("gateway order reference mismatch".to_string()));
    }
  }

  ctx_data.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "payment::mark_order_paid", skip_all)]
async fn mark_order_paid(ctx_data: ContextData<PaymentCtxData>) -> Result<PipelineControl> {
  let (app_state, callback, order) = {
    let guard = ctx_data.read();
    (guard.app_state.clone(), guard.callback.clone(), guard.order.clone())
  };
  let order: Order = order.ok_or_else(|| {
    error!("Order missing from payment context. Pipeline logic error.");
    AppError::Internal("Order unexpectedly missing from payment context.".to_string())
  })?;

  match order.payment_status {
    PaymentStatus::Delivered => {
      info!(order_code = %order.order_code, "Repeated callback for a delivered order; acknowledging.");
      ctx_data.write().already_delivered = true;
      return Ok(PipelineControl::Stop);
    }
    PaymentStatus::Refunded => {
      warn!(order_code = %order.order_code, "Payment callback for a refunded order.");
      return Err(AppError::Validation(format!("Order {} has been refunded.", order.order_code)));
    }
    PaymentStatus::Pending | PaymentStatus::Paid | PaymentStatus::Failed => {}
  }

  let paid = app_state.store.mark_order_paid(order.id, &callback.gateway_payment_id).await?;
  info!(order_code = %paid.order_code, "Payment verified and recorded.");
  record_audit(
    &app_state,
    NewAuditLog::new(LogCategory::Payment, format!("Payment verified for order {}", paid.order_code))
      .for_order(paid.id)
      .with_metadata(json!({
        "order_code": paid.order_code,
        "gateway_order_id": callback.gateway_order_id,
        "gateway_payment_id": callback.gateway_payment_id,
        "amount": paid.amount,
      })),
  )
  .await;
  ctx_data.write().order = Some(paid);
  Ok(PipelineControl::Continue)
}

/// Verifies a gateway callback and, once the order is paid, delivers it.
#[instrument(
  name = "payment::verify_payment",
  skip_all,
  fields(order_code = %callback.order_code),
  err(Display)
)]
pub async fn verify_payment(app_state: &AppState, callback: GatewayCallback) -> Result<PaymentConfirmation> {
  let order_code = callback.order_code.clone();
  let ctx_data = ContextData::new(PaymentCtxData {
    app_state: app_state.clone(),
    callback,
    order: None,
    already_delivered: false,
  });

  let result = app_state.orka_instance.run(ctx_data.clone()).await?;
  let already_delivered = ctx_data.read().already_delivered;
  if already_delivered {
    return Ok(PaymentConfirmation {
      order_code,
      payment_status: PaymentStatus::Delivered,
      delivery_status: DeliveryStatus::Delivered,
    });
  }
  if result != PipelineResult::Completed {
    return Err(AppError::Internal("Payment pipeline stopped unexpectedly.".to_string()));
  }

  let delivery_status = match deliver(app_state, &order_code, DeliveryTrigger::Payment).await {
    Ok(report) => report.status,
    Err(e) => {
      error!(error = %e, "Delivery after a verified payment failed; order left for retry.");
      DeliveryStatus::Pending
    }
  };
  let payment_status = if delivery_status == DeliveryStatus::Delivered {
    PaymentStatus::Delivered
  } else {
    PaymentStatus::Paid
  };
  Ok(PaymentConfirmation {
    order_code,
    payment_status,
    delivery_status,
  })
}
