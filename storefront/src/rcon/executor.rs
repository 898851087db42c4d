// storefront/src/rcon/executor.rs

use async_trait::async_trait;
use tracing::{instrument, warn};

use super::client::RconClient;
use crate::config::RconSettings;

/// Result of running one command against the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
  pub success: bool,
  /// Server reply on success, failure reason otherwise.
  pub message: String,
}

impl DeliveryOutcome {
  pub fn succeeded(response: impl Into<String>) -> Self {
    Self {
      success: true,
      message: response.into(),
    }
  }

  pub fn failed(reason: impl Into<String>) -> Self {
    Self {
      success: false,
      message: reason.into(),
    }
  }
}

/// Runs a synthesized command in-game. Failures are values, never errors:
/// an unreachable console must leave the order retryable.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
  async fn execute(&self, command: &str) -> DeliveryOutcome;
}

/// Opens a fresh console connection for every command.
#[derive(Debug, Clone)]
pub struct RconExecutor {
  settings: Option<RconSettings>,
}

impl RconExecutor {
  pub fn new(settings: Option<RconSettings>) -> Self {
    Self { settings }
  }
}

#[async_trait]
impl CommandExecutor for RconExecutor {
  #[instrument(name = "rcon::execute", skip(self))]
  async fn execute(&self, command: &str) -> DeliveryOutcome {
    let Some(settings) = &self.settings else {
      warn!("Remote console is not configured; command not sent.");
      return DeliveryOutcome::failed("Remote console is not configured");
    };

    let mut client = RconClient::new(settings.timeout);
    let outcome = match client.connect(&settings.host, settings.port, &settings.password).await {
      Ok(true) => match client.send_command(command).await {
        Ok(response) => DeliveryOutcome::succeeded(response),
        Err(e) => DeliveryOutcome::failed(format!("Command execution failed: {}", e)),
      },
      Ok(false) => DeliveryOutcome::failed("Remote console authentication failed"),
      Err(e) => DeliveryOutcome::failed(format!("Could not connect to remote console: {}", e)),
    };
    client.close().await;
    outcome
  }
}
