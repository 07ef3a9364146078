//! GATT table.
//!
//! UUID strings must stay in sync with the `u128` constants in
//! `ble2lora::ble::channel`; the proc macros only accept literals.

use ble2lora::config::MAX_PAYLOAD;
use heapless::{String, Vec};

#[nrf_softdevice::gatt_service(uuid = "180a")]
pub struct DeviceInformationService {
    #[characteristic(uuid = "2a29", read)]
    pub manufacturer: String<16>,
    #[characteristic(uuid = "2a24", read)]
    pub model: String<16>,
    #[characteristic(uuid = "2a25", read)]
    pub serial: String<16>,
    // Deployed apps read the hardware revision from 0x2A26.
    #[characteristic(uuid = "2a26", read)]
    pub hardware_revision: String<16>,
    #[characteristic(uuid = "2a28", read)]
    pub software_revision: String<16>,
}

#[nrf_softdevice::gatt_service(uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e")]
pub struct UartService {
    #[characteristic(uuid = "6e400002-b5a3-f393-e0a9-e50e24dcca9e", write, write_without_response)]
    pub rx: Vec<u8, MAX_PAYLOAD>,
    #[characteristic(uuid = "6e400003-b5a3-f393-e0a9-e50e24dcca9e", read, notify)]
    pub tx: Vec<u8, MAX_PAYLOAD>,
}

#[nrf_softdevice::gatt_service(uuid = "116459e5-ad1a-4d85-9b9d-fc2e6cd6b3e0")]
pub struct ProjectService {
    #[characteristic(uuid = "116459e6-ad1a-4d85-9b9d-fc2e6cd6b3e0", read, write)]
    pub number: Vec<u8, MAX_PAYLOAD>,
    #[characteristic(uuid = "116459e7-ad1a-4d85-9b9d-fc2e6cd6b3e0", write)]
    pub keepalive: Vec<u8, 16>,
}

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    /// Percentage as little-endian `i16`.
    #[characteristic(uuid = "2a19", read, notify)]
    pub level: i16,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub device_information: DeviceInformationService,
    pub uart: UartService,
    pub project: ProjectService,
    pub battery: BatteryService,
}
