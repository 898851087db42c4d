// storefront/src/pipelines/common_steps.rs

//! Helpers shared by several pipelines.

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::models::NewAuditLog;
use crate::services::notifier::MessageKind;
use crate::state::AppState;

/// Appends an audit row. A failed write is logged and never fails the caller.
pub async fn record_audit(app_state: &AppState, entry: NewAuditLog) {
  let category = entry.category.as_str();
  if let Err(e) = app_state.store.append_log(entry).await {
    warn!(error = %e, category, "Failed to write audit log entry.");
  }
}

/// Sends a customer message; returns whether it went out.
pub async fn notify_quietly(app_state: &AppState, kind: MessageKind, to: &str, payload: JsonValue) -> bool {
  match app_state.notifier.send(kind, to, payload).await {
    Ok(sent) => {
      tracing::debug!(kind = kind.as_str(), message_id = %sent.message_id, "Customer message sent.");
      true
    }
    Err(e) => {
      warn!(kind = kind.as_str(), error = %e, "Customer message could not be sent.");
      false
    }
  }
}
