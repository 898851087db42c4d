// storefront/tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tracing::Level;

use axis_store::config::AppConfig;
use axis_store::errors::{AppError, Result};
use axis_store::models::{
  ActiveEntitlement, AdminUser, AuditLogEntry, DeliveryRecord, NewAuditLog, NewEntitlement, NewOrder, Order,
};
use axis_store::rcon::{CommandExecutor, DeliveryOutcome};
use axis_store::services::notifier::{MessageKind, Notifier, SentMessage};
use axis_store::services::payment_verifier::{compute_signature, GatewayCallback};
use axis_store::state::AppState;
use axis_store::store::{MemoryStore, Store};
use uuid::Uuid;

pub const PAYMENT_SECRET: &str = "test_payment_key_secret";
pub const SESSION_SECRET: &str = "test_admin_session_secret";
pub const CRON_SECRET: &str = "test_cron_secret";
pub const MIGRATION_PASSWORD: &str = "axis-migrate-2024";

// --- Console double: records every command and replays scripted outcomes ---
#[derive(Default)]
pub struct ScriptedExecutor {
  commands: Mutex<Vec<String>>,
  scripted: Mutex<VecDeque<DeliveryOutcome>>,
}

impl ScriptedExecutor {
  /// Succeeds on every command unless outcomes were queued.
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn failing(reason: &str) -> Arc<Self> {
    let executor = Self::default();
    executor.push_outcome(DeliveryOutcome::failed(reason));
    Arc::new(executor)
  }

  pub fn push_outcome(&self, outcome: DeliveryOutcome) {
    self.scripted.lock().push_back(outcome);
  }

  pub fn commands(&self) -> Vec<String> {
    self.commands.lock().clone()
  }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
  async fn execute(&self, command: &str) -> DeliveryOutcome {
    self.commands.lock().push(command.to_string());
    let next = self.scripted.lock().pop_front();
    next.unwrap_or_else(|| DeliveryOutcome::succeeded(format!("ok: {}", command)))
  }
}

// --- Notifier double ---
#[derive(Debug, Clone)]
pub struct RecordedMessage {
  pub kind: MessageKind,
  pub to: String,
  pub payload: JsonValue,
}

#[derive(Default)]
pub struct RecordingNotifier {
  sent: Mutex<Vec<RecordedMessage>>,
  fail_for: Mutex<Vec<String>>,
}

impl RecordingNotifier {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Every send to `address` fails from now on.
  pub fn fail_for(&self, address: &str) {
    self.fail_for.lock().push(address.to_string());
  }

  pub fn sent(&self) -> Vec<RecordedMessage> {
    self.sent.lock().clone()
  }

  pub fn sent_of(&self, kind: MessageKind) -> Vec<RecordedMessage> {
    self.sent().into_iter().filter(|m| m.kind == kind).collect()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send(&self, kind: MessageKind, to: &str, payload: JsonValue) -> Result<SentMessage> {
    if self.fail_for.lock().iter().any(|a| a == to) {
      return Err(AppError::Notification(format!("mailbox {} unavailable", to)));
    }
    self.sent.lock().push(RecordedMessage {
      kind,
      to: to.to_string(),
      payload,
    });
    Ok(SentMessage {
      message_id: format!("test_{}", uuid::Uuid::new_v4()),
      subject: kind.as_str().to_string(),
    })
  }
}

// --- Store double: a memory store whose writes can be made to fail ---
#[derive(Default)]
pub struct FlakyStore {
  inner: Arc<MemoryStore>,
  failing_inserts: AtomicUsize,
  failing_deactivations: AtomicUsize,
}

fn pool_down() -> AppError {
  AppError::Sqlx(sqlx::Error::PoolTimedOut)
}

/// Consumes one scheduled failure, if any are left.
fn take_failure(counter: &AtomicUsize) -> bool {
  counter
    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
    .is_ok()
}

impl FlakyStore {
  pub fn wrapping(inner: Arc<MemoryStore>) -> Arc<Self> {
    Arc::new(Self {
      inner,
      ..Self::default()
    })
  }

  /// The next `times` entitlement inserts fail.
  pub fn fail_inserts(&self, times: usize) {
    self.failing_inserts.store(times, Ordering::SeqCst);
  }

  /// The next `times` deactivations fail.
  pub fn fail_deactivations(&self, times: usize) {
    self.failing_deactivations.store(times, Ordering::SeqCst);
  }
}

#[async_trait]
impl Store for FlakyStore {
  async fn insert_order(&self, order: NewOrder) -> Result<Order> {
    self.inner.insert_order(order).await
  }

  async fn find_order_by_code(&self, order_code: &str) -> Result<Option<Order>> {
    self.inner.find_order_by_code(order_code).await
  }

  async fn find_order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
    self.inner.find_order_by_id(id).await
  }

  async fn mark_order_paid(&self, id: Uuid, gateway_payment_id: &str) -> Result<Order> {
    self.inner.mark_order_paid(id, gateway_payment_id).await
  }

  async fn record_delivery_attempt(&self, id: Uuid, record: &DeliveryRecord) -> Result<()> {
    self.inner.record_delivery_attempt(id, record).await
  }

  async fn insert_entitlement(&self, grant: NewEntitlement) -> Result<ActiveEntitlement> {
    if take_failure(&self.failing_inserts) {
      return Err(pool_down());
    }
    self.inner.insert_entitlement(grant).await
  }

  async fn active_entitlements(&self) -> Result<Vec<ActiveEntitlement>> {
    self.inner.active_entitlements().await
  }

  async fn entitlements_for_order(&self, order_id: Uuid) -> Result<Vec<ActiveEntitlement>> {
    self.inner.entitlements_for_order(order_id).await
  }

  async fn deactivate_entitlement(&self, id: Uuid, revoked_at: DateTime<Utc>) -> Result<()> {
    if take_failure(&self.failing_deactivations) {
      return Err(pool_down());
    }
    self.inner.deactivate_entitlement(id, revoked_at).await
  }

  async fn append_log(&self, entry: NewAuditLog) -> Result<()> {
    self.inner.append_log(entry).await
  }

  async fn recent_logs(&self, limit: i64) -> Result<Vec<AuditLogEntry>> {
    self.inner.recent_logs(limit).await
  }

  async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
    self.inner.find_admin_by_email(email).await
  }

  async fn update_admin_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
    self.inner.update_admin_password_hash(id, password_hash).await
  }

  async fn customer_emails(&self) -> Result<Vec<String>> {
    self.inner.customer_emails().await
  }
}

// --- State builders ---
pub fn test_config() -> AppConfig {
  test_config_with(&[])
}

pub fn test_config_with(extra: &[(&str, &str)]) -> AppConfig {
  let mut vars: HashMap<String, String> = [
    ("PAYMENT_KEY_SECRET", PAYMENT_SECRET),
    ("ADMIN_SESSION_SECRET", SESSION_SECRET),
    ("CRON_SECRET", CRON_SECRET),
    ("ADMIN_MIGRATION_PASSWORD", MIGRATION_PASSWORD),
  ]
  .iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect();
  for (k, v) in extra {
    vars.insert(k.to_string(), v.to_string());
  }
  AppConfig::from_lookup(|name| vars.get(name).cloned()).expect("test config should be valid")
}

pub struct Harness {
  pub state: AppState,
  pub store: Arc<MemoryStore>,
  pub executor: Arc<ScriptedExecutor>,
  pub notifier: Arc<RecordingNotifier>,
}

pub fn harness() -> Harness {
  harness_with(test_config(), ScriptedExecutor::new())
}

pub fn harness_with(config: AppConfig, executor: Arc<ScriptedExecutor>) -> Harness {
  let store = Arc::new(MemoryStore::new());
  build_harness(config, executor, store.clone(), store)
}

/// The workflows see a [`FlakyStore`]; `Harness::store` is the memory store behind it.
pub fn flaky_harness() -> (Harness, Arc<FlakyStore>) {
  let store = Arc::new(MemoryStore::new());
  let flaky = FlakyStore::wrapping(store.clone());
  let harness = build_harness(test_config(), ScriptedExecutor::new(), store, flaky.clone());
  (harness, flaky)
}

fn build_harness(
  config: AppConfig,
  executor: Arc<ScriptedExecutor>,
  store: Arc<MemoryStore>,
  seen_by_state: Arc<dyn Store>,
) -> Harness {
  let notifier = RecordingNotifier::new();
  let state = AppState::new(
    config,
    seen_by_state,
    executor.clone() as Arc<dyn CommandExecutor>,
    notifier.clone() as Arc<dyn Notifier>,
  );
  Harness {
    state,
    store,
    executor,
    notifier,
  }
}

// --- Order helpers ---
pub fn new_order(product_type: &str, product_name: &str, player: &str) -> NewOrder {
  NewOrder {
    product_type: product_type.to_string(),
    product_name: product_name.to_string(),
    amount: 499,
    minecraft_username: player.to_string(),
    gift_recipient: None,
    email: Some(format!("{}@players.test", player.to_ascii_lowercase())),
    gateway_order_id: Some(format!("order_{}", uuid::Uuid::new_v4().simple())),
  }
}

pub async fn insert_order(harness: &Harness, order: NewOrder) -> Order {
  harness.store.insert_order(order).await.expect("insert order")
}

/// Inserts the order and marks it paid, as the payment pipeline would.
pub async fn insert_paid_order(harness: &Harness, order: NewOrder) -> Order {
  let order = insert_order(harness, order).await;
  harness
    .store
    .mark_order_paid(order.id, "pay_seeded")
    .await
    .expect("mark order paid")
}

/// Builds the callback the gateway would send for `order`.
pub fn signed_callback(order: &Order, payment_id: &str) -> GatewayCallback {
  let gateway_order_id = order.gateway_order_id.clone().unwrap_or_default();
  let signature = compute_signature(PAYMENT_SECRET, &gateway_order_id, payment_id).expect("sign callback");
  GatewayCallback {
    order_code: order.order_code.clone(),
    gateway_order_id,
    gateway_payment_id: payment_id.to_string(),
    signature,
  }
}

pub fn log_categories(store: &MemoryStore) -> Vec<String> {
  store.logs().into_iter().map(|l| l.category).collect()
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
