// storefront/src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::rcon::CommandExecutor;
use crate::services::notifier::Notifier;
use crate::store::Store;
use std::sync::Arc;

/// Everything a request or pipeline step needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub orka_instance: Arc<orka::Orka<AppError>>,
  pub config: Arc<AppConfig>,
  /// Opens its own console connection per command.
  pub console: Arc<dyn CommandExecutor>,
  pub notifier: Arc<dyn Notifier>,
}

impl AppState {
  /// Builds the state and registers every pipeline on a fresh registry.
  pub fn new(
    config: AppConfig,
    store: Arc<dyn Store>,
    console: Arc<dyn CommandExecutor>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    let state = Self {
      store,
      orka_instance: Arc::new(orka::Orka::new()),
      config: Arc::new(config),
      console,
      notifier,
    };
    crate::pipelines::register_all_pipelines(&state.orka_instance, &state);
    state
  }
}
