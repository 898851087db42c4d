// storefront/src/lib.rs

//! Payment verification, in-game delivery and rank lifecycle for the Axis SMP
//! store.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod rcon;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
