//! ble2lora - BLE-to-LoRa bridge firmware for a scoreboard controller.
//!
//! This library holds all of the firmware's logic in hardware-independent
//! form. Each piece is generic over a small capability trait (BLE
//! transport, radio, flash, ADC, GPIO, delay), so the whole crate runs on
//! the host.
//!
//! Usage: `cargo test --lib --tests`
//!
//! Note: The embedded binary (main.rs, `embedded` feature) binds those
//! traits to nrf-softdevice and embassy-nrf and spawns one task per
//! component.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Shared state and configuration
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;
pub mod project;
pub mod session;

// ═══════════════════════════════════════════════════════════════════════════
// Peripherals
// ═══════════════════════════════════════════════════════════════════════════

pub mod battery;
pub mod ble;
pub mod radio;

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

pub mod tasks;

pub use error::{ChannelError, Error, StoreError, TransportError};

#[cfg(test)]
pub(crate) mod testing;
