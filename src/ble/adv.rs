//! Advertising payload construction.
//!
//! Advertising data: flags, the UART service UUID, appearance.
//! Scan response: the device name, shortened if it does not fit.

use crate::ble::channel::UART_SERVICE_UUID;
use crate::config::{
    ADV_INTERVAL_MS, APPEARANCE_GENERIC_REMOTE_CONTROL, DEVICE_NAME_MAX_LEN, DEVICE_NAME_PREFIX,
};
use crate::project::ProjectId;
use heapless::{String, Vec};

/// Legacy advertising PDU payload limit.
pub const ADV_PAYLOAD_MAX: usize = 31;

pub type DeviceName = String<DEVICE_NAME_MAX_LEN>;
pub type AdvPayload = Vec<u8, ADV_PAYLOAD_MAX>;

// AD types (Bluetooth Core Supplement, part A)
const AD_FLAGS: u8 = 0x01;
const AD_COMPLETE_128: u8 = 0x07;
const AD_SHORT_NAME: u8 = 0x08;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_APPEARANCE: u8 = 0x19;

/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_DISC_NO_BREDR: u8 = 0x06;

/// `DEVICE_NAME_PREFIX` followed by the project number, cut to
/// [`DEVICE_NAME_MAX_LEN`] on a character boundary.
pub fn device_name(project: &ProjectId) -> DeviceName {
    let mut name = DeviceName::new();
    for c in DEVICE_NAME_PREFIX.chars().chain(project.as_str().chars()) {
        if name.push(c).is_err() {
            break;
        }
    }
    name
}

/// Everything the transport needs to start one advertising round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertisement {
    pub name: DeviceName,
    pub adv_data: AdvPayload,
    pub scan_data: AdvPayload,
    pub interval_ms: u32,
}

impl Advertisement {
    pub fn for_project(project: &ProjectId) -> Self {
        let name = device_name(project);
        Self {
            adv_data: adv_data(),
            scan_data: scan_data(&name),
            name,
            interval_ms: ADV_INTERVAL_MS,
        }
    }
}

fn adv_data() -> AdvPayload {
    let mut d = AdvPayload::new();
    // 3 + 18 + 4 = 25 bytes, always fits.
    let _ = d.extend_from_slice(&[2, AD_FLAGS, FLAGS_GENERAL_DISC_NO_BREDR]);
    let _ = d.extend_from_slice(&[17, AD_COMPLETE_128]);
    let _ = d.extend_from_slice(&UART_SERVICE_UUID.to_le_bytes());
    let _ = d.extend_from_slice(&[3, AD_APPEARANCE]);
    let _ = d.extend_from_slice(&APPEARANCE_GENERIC_REMOTE_CONTROL.to_le_bytes());
    d
}

fn scan_data(name: &str) -> AdvPayload {
    let room = ADV_PAYLOAD_MAX - 2;
    let (ad_type, name) = if name.len() <= room {
        (AD_COMPLETE_NAME, name)
    } else {
        let mut end = room;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        (AD_SHORT_NAME, &name[..end])
    };

    let mut d = AdvPayload::new();
    let _ = d.push(name.len() as u8 + 1);
    let _ = d.push(ad_type);
    let _ = d.extend_from_slice(name.as_bytes());
    d
}
