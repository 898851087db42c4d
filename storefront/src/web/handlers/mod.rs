// storefront/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod cron_handlers;
pub mod payment_handlers;
