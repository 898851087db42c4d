// storefront/src/services/broadcast.rs

//! Admin announcements to every customer who left an email address.

use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{LogCategory, NewAuditLog};
use crate::services::notifier::MessageKind;
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
  pub recipients: usize,
  pub sent: usize,
  pub failed: usize,
}

/// Sends one `bulk` message per distinct customer email. Individual send
/// failures are counted, not returned.
#[instrument(name = "broadcast::send_bulk_message", skip(app_state, body), err(Display))]
pub async fn send_bulk_message(app_state: &AppState, admin_id: Uuid, subject: &str, body: &str) -> Result<BulkReport> {
  if subject.trim().is_empty() || body.trim().is_empty() {
    return Err(AppError::Validation("Subject and body are required.".to_string()));
  }

  let emails = app_state.store.customer_emails().await?;
  let mut report = BulkReport {
    recipients: emails.len(),
    ..BulkReport::default()
  };
  for email in &emails {
    let payload = json!({ "subject": subject.trim(), "body": body });
    match app_state.notifier.send(MessageKind::Bulk, email, payload).await {
      Ok(_) => report.sent += 1,
      Err(e) => {
        warn!(error = %e, "Bulk message could not be sent to one recipient.");
        report.failed += 1;
      }
    }
  }

  info!(recipients = report.recipients, sent = report.sent, failed = report.failed, "Bulk message finished.");
  let entry = NewAuditLog::new(LogCategory::Email, format!("Bulk message '{}' sent", subject.trim())).with_metadata(
    json!({
      "admin_id": admin_id,
      "recipients": report.recipients,
      "sent": report.sent,
      "failed": report.failed,
    }),
  );
  if let Err(e) = app_state.store.append_log(entry).await {
    warn!(error = %e, "Failed to write audit log entry.");
  }
  Ok(report)
}
