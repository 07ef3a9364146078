//! Device Information service (0x180A) values.

use crate::config::{HARDWARE_REVISION, MANUFACTURER, MODEL, SOFTWARE_REVISION};
use heapless::String;

pub type SerialNumber = String<16>;

/// Static strings exposed read-only to the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial: SerialNumber,
    pub hardware_revision: &'static str,
    pub software_revision: &'static str,
}

impl DeviceInfo {
    pub fn new(chip_id: [u8; 8]) -> Self {
        Self {
            manufacturer: MANUFACTURER,
            model: MODEL,
            serial: serial_number(chip_id),
            hardware_revision: HARDWARE_REVISION,
            software_revision: SOFTWARE_REVISION,
        }
    }
}

/// Lowercase hex rendering of the 64-bit chip id.
pub fn serial_number(chip_id: [u8; 8]) -> SerialNumber {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = SerialNumber::new();
    for b in chip_id {
        let _ = s.push(HEX[(b >> 4) as usize] as char);
        let _ = s.push(HEX[(b & 0x0F) as usize] as char);
    }
    s
}
