// storefront/src/pipelines/mod.rs

//! Orka pipelines for every multi-step workflow of the store.

use crate::errors::AppError;
use crate::state::AppState;
use orka::Orka;
use std::sync::Arc;

pub mod common_steps;
pub mod contexts;

pub mod admin_signin_pipeline;
pub mod delivery_pipeline;
pub mod payment_pipeline;
pub mod sweeper_pipeline;

pub use admin_signin_pipeline::admin_signin;
pub use contexts::{AdminSessionGrant, DeliveryReport, DeliveryTrigger, PaymentConfirmation, SweepSummary};
pub use delivery_pipeline::deliver;
pub use payment_pipeline::verify_payment;
pub use sweeper_pipeline::run_rank_sweep;

/// Registers every pipeline with the registry. Called once per `AppState`.
pub fn register_all_pipelines(orka_instance: &Arc<Orka<AppError>>, app_state: &AppState) {
  tracing::info!("Registering Orka pipelines...");

  payment_pipeline::register_payment_pipeline(orka_instance, app_state);
  delivery_pipeline::register_delivery_pipeline(orka_instance, app_state);
  sweeper_pipeline::register_sweeper_pipeline(orka_instance, app_state);
  admin_signin_pipeline::register_admin_signin_pipeline(orka_instance, app_state);

  tracing::info!("All application pipelines registered with Orka.");
}
