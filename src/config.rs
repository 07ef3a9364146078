//! Application-wide constants and compile-time configuration.
//!
//! All identity strings, timing parameters, and hardware conversion
//! constants live here so they can be tuned in one place.

// Identity

/// Advertised name is this prefix followed by the project number.
pub const DEVICE_NAME_PREFIX: &str = "AusSport Sboard P";

/// Capacity of the advertised device name.
pub const DEVICE_NAME_MAX_LEN: usize = 40;

/// Project number used when nothing has been persisted yet.
pub const DEFAULT_PROJECT: &str = "000000";

/// Longest project number accepted from the peer.
pub const PROJECT_MAX_LEN: usize = 16;

/// Periodic UART-TX text is this prefix followed by the project number.
pub const KEEP_WARM_PREFIX: &str = "AusSport P";

/// UART-TX confirmation after a project number write.
pub const PROJECT_CONFIRM_PREFIX: &str = "Received New Project: ";

/// UART-TX report sent when the radio did not accept a message.
pub const RADIO_STATUS_PREFIX: &str = "Radio: ";

// Device Information service

pub const MANUFACTURER: &str = "AusSport";
pub const MODEL: &str = "Sboard LoRa";
pub const HARDWARE_REVISION: &str = "1.0";
pub const SOFTWARE_REVISION: &str = env!("CARGO_PKG_VERSION");

// BLE

/// Advertising interval (ms). Converted to 0.625 ms units by the transport.
pub const ADV_INTERVAL_MS: u32 = 250;

/// GAP appearance: generic remote control.
pub const APPEARANCE_GENERIC_REMOTE_CONTROL: u16 = 384;

/// Largest characteristic value (write or notify) handled by the firmware.
pub const MAX_PAYLOAD: usize = 128;

/// Captured writes buffered per writable characteristic.
pub const INBOX_DEPTH: usize = 4;

/// Preferred ATT MTU so UART-TX notifications are not cut to 20 bytes.
pub const ATT_MTU: u16 = 247;

// Session timing

/// Period of the "still alive" UART-TX notification while connected.
pub const KEEP_WARM_INTERVAL_MS: u32 = 5_000;

/// How long the liveness monitor waits for each keepalive write.
pub const KEEPALIVE_TIMEOUT_MS: u32 = 5_000;

/// Consecutive missed keepalives that force a local teardown.
pub const MAX_MISSED_KEEPALIVES: u8 = 3;

/// Exact keepalive payload expected from the peer.
pub const KEEPALIVE_TOKEN: &[u8] = b"OK";

/// Sleep between re-checks of the session while no peer is connected.
pub const IDLE_BACKOFF_MS: u32 = 100;

/// Delay before re-advertising after the stack refused to advertise.
pub const ADVERTISE_RETRY_MS: u32 = 1_000;

/// Longest wait for the stack to confirm a locally requested disconnect.
pub const DISCONNECT_TIMEOUT_MS: u32 = 1_000;

// Battery

/// Sampling and reporting period.
pub const BATTERY_INTERVAL_MS: u32 = 5_000;

/// Reference voltage of an empty LiPo cell.
pub const BATTERY_EMPTY_VOLTS: f32 = 2.8;

/// Reference voltage of a full LiPo cell.
pub const BATTERY_FULL_VOLTS: f32 = 4.2;

/// SAADC counts to battery volts: 12-bit, gain 1/6 against the 0.6 V
/// internal reference (3.6 V full scale), behind a 1:2 resistor divider.
pub const ADC_VOLTS_PER_COUNT: f32 = 3.6 * 2.0 / 4096.0;

// Status LED

pub const BLINK_CONNECTED_MS: u32 = 1_000;
pub const BLINK_IDLE_MS: u32 = 250;

// E32 LoRa module

/// UART speed of the module in normal (transparent) mode.
pub const E32_BAUD: u32 = 9_600;

/// Largest payload the module transmits in one packet.
pub const E32_MAX_PACKET: usize = 58;

/// Upper bound on waiting for AUX to signal "ready".
pub const E32_AUX_TIMEOUT_MS: u32 = 1_000;

/// Settle time after changing M0/M1.
pub const E32_MODE_SETTLE_MS: u32 = 40;

// GPIO pin assignments (nRF52840-DK defaults)
//
//   Status LED     → P0.13
//   E32 TXD (MCU)  → P0.06
//   E32 RXD (MCU)  → P0.08
//   E32 M0         → P0.03
//   E32 M1         → P0.28
//   E32 AUX        → P0.30
//   Battery sense  → P0.04 (AIN2)
//   USB power      → P0.31

// Project number storage

/// Flash page index where the project record starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for the project record.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 2;
