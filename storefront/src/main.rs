// storefront/src/main.rs

use axis_store::config::{AppConfig, LogFormat};
use axis_store::pipelines::sweeper_pipeline::run_sweep_timer;
use axis_store::rcon::RconExecutor;
use axis_store::services::notifier::LogNotifier;
use axis_store::state::AppState;
use axis_store::store::{MemoryStore, PgStore, Store};
use axis_store::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::PgPool;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

async fn open_store(app_config: &AppConfig) -> io::Result<Arc<dyn Store>> {
  let Some(database_url) = app_config.database_url.as_deref() else {
    tracing::warn!("DATABASE_URL is not set; using the in-memory store. Nothing survives a restart.");
    return Ok(Arc::new(MemoryStore::new()));
  };
  let pool = PgPool::connect(database_url).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to connect to the database.");
    io::Error::other(e)
  })?;
  tracing::info!("Successfully connected to the database.");
  let store = PgStore::new(pool);
  store.migrate().await.map_err(|e| {
    tracing::error!(error = %e, "Database migrations failed.");
    io::Error::other(e.to_string())
  })?;
  Ok(Arc::new(store))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  let app_config = AppConfig::from_env().map_err(|e| {
    eprintln!("Configuration error: {}", e);
    io::Error::other(e.to_string())
  })?;
  init_tracing(app_config.log_format);
  tracing::info!(config = ?app_config, "Starting Axis store server...");

  let store = open_store(&app_config).await?;
  if app_config.rcon.is_none() {
    tracing::warn!("RCON_HOST/RCON_PASSWORD not set; deliveries will stay pending.");
  }
  let console = Arc::new(RconExecutor::new(app_config.rcon.clone()));
  let notifier = Arc::new(LogNotifier::new(app_config.email_sender.clone()));
  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let sweep_interval = app_config.sweep_interval;

  let app_state = AppState::new(app_config, store, console, notifier);
  tracing::info!("Orka pipelines registered.");

  if !sweep_interval.is_zero() {
    tracing::info!(interval_secs = sweep_interval.as_secs(), "In-process rank sweep timer enabled.");
    actix_rt::spawn(run_sweep_timer(app_state.clone(), sweep_interval));
  }

  tracing::info!("Attempting to bind server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
