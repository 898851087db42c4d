// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Where the game server's remote console listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconSettings {
  pub host: String,
  pub port: u16,
  pub password: String,
  pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: Option<String>,

  /// `None` when the console is not configured; deliveries then stay pending.
  pub rcon: Option<RconSettings>,

  pub payment_key_secret: String,

  pub admin_session_secret: String,
  pub admin_session_ttl: Duration,
  /// Only accounts still carrying the legacy marker may sign in with this.
  pub admin_migration_password: Option<String>,

  pub cron_secret: Option<String>,
  /// Zero disables the in-process sweep timer.
  pub sweep_interval: Duration,

  pub email_sender: String,
  pub log_format: LogFormat,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("database_configured", &self.database_url.is_some())
      .field("rcon_host", &self.rcon.as_ref().map(|r| format!("{}:{}", r.host, r.port)))
      .field("admin_session_ttl", &self.admin_session_ttl)
      .field("cron_trigger_enabled", &self.cron_secret.is_some())
      .field("sweep_interval", &self.sweep_interval)
      .field("email_sender", &self.email_sender)
      .field("log_format", &self.log_format)
      .finish_non_exhaustive()
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from an arbitrary variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let optional = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let required = |name: &str| {
      optional(name).ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", name)))
    };

    let server_host = optional("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_or("SERVER_PORT", optional("SERVER_PORT"), 8080u16)?;
    let database_url = optional("DATABASE_URL");

    let rcon_timeout = Duration::from_secs(parse_or("RCON_TIMEOUT_SECS", optional("RCON_TIMEOUT_SECS"), 10u64)?);
    let rcon = match (optional("RCON_HOST"), optional("RCON_PASSWORD")) {
      (Some(host), Some(password)) => Some(RconSettings {
        host,
        port: parse_or("RCON_PORT", optional("RCON_PORT"), 25575u16)?,
        password,
        timeout: rcon_timeout,
      }),
      _ => None,
    };

    let payment_key_secret = required("PAYMENT_KEY_SECRET")?;
    let admin_session_secret = required("ADMIN_SESSION_SECRET")?;
    let admin_session_ttl = Duration::from_secs(parse_or(
      "ADMIN_SESSION_TTL_SECS",
      optional("ADMIN_SESSION_TTL_SECS"),
      12 * 60 * 60u64,
    )?);
    let admin_migration_password = optional("ADMIN_MIGRATION_PASSWORD");

    let cron_secret = optional("CRON_SECRET");
    let sweep_interval = Duration::from_secs(parse_or("SWEEP_INTERVAL_SECS", optional("SWEEP_INTERVAL_SECS"), 0u64)?);

    let email_sender = optional("EMAIL_SENDER").unwrap_or_else(|| "noreply@axissmp.in".to_string());
    let log_format = match optional("LOG_FORMAT").as_deref() {
      None | Some("pretty") => LogFormat::Pretty,
      Some("json") => LogFormat::Json,
      Some(other) => return Err(AppError::Config(format!("Invalid LOG_FORMAT: {}", other))),
    };

    Ok(Self {
      server_host,
      server_port,
      database_url,
      rcon,
      payment_key_secret,
      admin_session_secret,
      admin_session_ttl,
      admin_migration_password,
      cron_secret,
      sweep_interval,
      email_sender,
      log_format,
    })
  }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match raw {
    None => Ok(default),
    Some(v) => v
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
  }

  const BASE: &[(&str, &str)] = &[("PAYMENT_KEY_SECRET", "pk_secret"), ("ADMIN_SESSION_SECRET", "sess")];

  #[test]
  fn defaults_apply_when_optional_values_are_missing() {
    let cfg = AppConfig::from_lookup(lookup_from(BASE)).unwrap();
    assert_eq!(cfg.server_host, "127.0.0.1");
    assert_eq!(cfg.server_port, 8080);
    assert!(cfg.database_url.is_none());
    assert!(cfg.rcon.is_none());
    assert_eq!(cfg.sweep_interval, Duration::ZERO);
    assert_eq!(cfg.log_format, LogFormat::Pretty);
  }

  #[test]
  fn rcon_requires_host_and_password() {
    let mut pairs = BASE.to_vec();
    pairs.push(("RCON_HOST", "play.axissmp.in"));
    let cfg = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();
    assert!(cfg.rcon.is_none());

    pairs.push(("RCON_PASSWORD", "hunter2"));
    pairs.push(("RCON_TIMEOUT_SECS", "3"));
    let cfg = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();
    let rcon = cfg.rcon.unwrap();
    assert_eq!(rcon.port, 25575);
    assert_eq!(rcon.timeout, Duration::from_secs(3));
  }

  #[test]
  fn missing_secret_is_a_config_error() {
    let err = AppConfig::from_lookup(lookup_from(&[("ADMIN_SESSION_SECRET", "s")])).unwrap_err();
    assert!(matches!(err, AppError::Config(m) if m.contains("PAYMENT_KEY_SECRET")));
  }

  #[test]
  fn invalid_port_is_rejected() {
    let mut pairs = BASE.to_vec();
    pairs.push(("SERVER_PORT", "eighty"));
    assert!(matches!(AppConfig::from_lookup(lookup_from(&pairs)), Err(AppError::Config(_))));
  }

  #[test]
  fn debug_output_hides_secrets() {
    let mut pairs = BASE.to_vec();
    pairs.push(("RCON_HOST", "localhost"));
    pairs.push(("RCON_PASSWORD", "hunter2"));
    let rendered = format!("{:?}", AppConfig::from_lookup(lookup_from(&pairs)).unwrap());
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("pk_secret"));
  }
}
