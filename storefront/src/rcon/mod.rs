// storefront/src/rcon/mod.rs

//! Minecraft/Source remote console protocol.

pub mod client;
pub mod executor;
pub mod packet;

pub use client::{RconClient, RconError};
pub use executor::{CommandExecutor, DeliveryOutcome, RconExecutor};
pub use packet::{Packet, PacketError};
