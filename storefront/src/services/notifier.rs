// storefront/src/services/notifier.rs

//! Outbound customer messages.
//!
//! The real mail provider sits outside this crate. Callers treat every
//! notifier error as non-fatal: they log it and move on.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
  Receipt,
  Failed,
  ExpiryReminder,
  Bulk,
}

impl MessageKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      MessageKind::Receipt => "receipt",
      MessageKind::Failed => "failed",
      MessageKind::ExpiryReminder => "expiry_reminder",
      MessageKind::Bulk => "bulk",
    }
  }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
  pub message_id: String,
  pub subject: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send(&self, kind: MessageKind, to: &str, payload: JsonValue) -> Result<SentMessage>;
}

/// Renders the subject line and writes the message to the log.
pub struct LogNotifier {
  sender: String,
}

impl LogNotifier {
  pub fn new(sender: impl Into<String>) -> Self {
    Self { sender: sender.into() }
  }
}

pub fn subject_for(kind: MessageKind, payload: &JsonValue) -> String {
  let field = |name: &str| payload.get(name).and_then(JsonValue::as_str).unwrap_or("").to_string();
  match kind {
    MessageKind::Receipt => format!("Your Axis SMP purchase is live: {}", field("product_name")),
    MessageKind::Failed => format!("Action needed on order {}", field("order_code")),
    MessageKind::ExpiryReminder => format!("Your {} rank expires soon", field("rank_name")),
    MessageKind::Bulk => {
      let subject = field("subject");
      if subject.is_empty() {
        "News from Axis SMP".to_string()
      } else {
        subject
      }
    }
  }
}

#[async_trait]
impl Notifier for LogNotifier {
  #[instrument(name = "notifier::send", skip(self, payload), fields(kind = kind.as_str()))]
  async fn send(&self, kind: MessageKind, to: &str, payload: JsonValue) -> Result<SentMessage> {
    let subject = subject_for(kind, &payload);
    let message_id = format!("msg_{}", uuid::Uuid::new_v4());
    info!(
      from = %self.sender,
      to,
      subject = %subject,
      message_id = %message_id,
      "Customer message dispatched."
    );
    Ok(SentMessage { message_id, subject })
  }
}
