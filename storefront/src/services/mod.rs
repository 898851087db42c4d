// storefront/src/services/mod.rs

pub mod admin_session;
pub mod broadcast;
pub mod commands;
pub mod credentials;
pub mod notifier;
pub mod payment_verifier;
