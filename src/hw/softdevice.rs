//! nrf-softdevice bindings for the `Peripheral`, `Link` and `Outbound`
//! traits.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use ble2lora::ble::adv::Advertisement;
use ble2lora::ble::channel::{ChannelId, Inboxes, Outbound};
use ble2lora::ble::device_info::DeviceInfo;
use ble2lora::ble::{Link, Peripheral};
use ble2lora::session::PeerHandle;
use ble2lora::TransportError;
use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::{String, Vec};
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError};
use nrf_softdevice::ble::{peripheral, Connection};
use nrf_softdevice::{raw, Softdevice};

use super::gatt::{
    BatteryServiceEvent, ProjectServiceEvent, Server, ServerEvent, UartServiceEvent,
};

/// The single live connection, shared between the link and the outbound side.
pub struct ConnSlot(Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>>);

impl ConnSlot {
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(None)))
    }

    fn get(&self) -> Option<Connection> {
        self.0.lock(|c| c.borrow().clone())
    }

    fn put(&self, conn: Option<Connection>) {
        self.0.lock(|c| *c.borrow_mut() = conn);
    }
}

/// CCCD state per notifiable channel for the current connection.
pub struct Subscriptions {
    uart_tx: AtomicBool,
    battery: AtomicBool,
}

impl Subscriptions {
    pub const fn new() -> Self {
        Self {
            uart_tx: AtomicBool::new(false),
            battery: AtomicBool::new(false),
        }
    }

    fn flag(&self, channel: ChannelId) -> Option<&AtomicBool> {
        match channel {
            ChannelId::UartTx => Some(&self.uart_tx),
            ChannelId::Battery => Some(&self.battery),
            _ => None,
        }
    }

    fn set(&self, channel: ChannelId, on: bool) {
        if let Some(f) = self.flag(channel) {
            f.store(on, Ordering::Relaxed);
        }
        debug!("{:?} notifications {}", channel, on);
    }

    fn enabled(&self, channel: ChannelId) -> bool {
        self.flag(channel).is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn clear(&self) {
        self.uart_tx.store(false, Ordering::Relaxed);
        self.battery.store(false, Ordering::Relaxed);
    }
}

/// Write the Device Information strings into the GATT table.
pub fn publish_device_info(server: &Server, info: &DeviceInfo) {
    let svc = &server.device_information;
    let results = [
        svc.manufacturer_set(&short(info.manufacturer)),
        svc.model_set(&short(info.model)),
        svc.serial_set(&info.serial),
        svc.hardware_revision_set(&short(info.hardware_revision)),
        svc.software_revision_set(&short(info.software_revision)),
    ];
    if results.iter().any(|r| r.is_err()) {
        warn!("failed to set device information");
    }
}

fn short(s: &str) -> String<16> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

pub struct SoftdevicePeripheral {
    sd: &'static Softdevice,
    server: &'static Server,
    slot: &'static ConnSlot,
    subs: &'static Subscriptions,
}

impl SoftdevicePeripheral {
    pub fn new(
        sd: &'static Softdevice,
        server: &'static Server,
        slot: &'static ConnSlot,
        subs: &'static Subscriptions,
    ) -> Self {
        Self {
            sd,
            server,
            slot,
            subs,
        }
    }

    /// GAP device name, as read by a connected central.
    fn set_gap_name(name: &str) {
        // SAFETY: zero is a valid bit pattern for this plain C struct.
        let mut perm: raw::ble_gap_conn_sec_mode_t = unsafe { core::mem::zeroed() };
        // Security mode 1 level 1: open.
        perm.set_sm(1);
        perm.set_lv(1);
        // SAFETY: the SoftDevice copies the name before returning.
        let ret = unsafe { raw::sd_ble_gap_device_name_set(&perm, name.as_ptr(), name.len() as u16) };
        if ret != raw::NRF_SUCCESS {
            warn!("sd_ble_gap_device_name_set: {}", ret);
        }
    }
}

impl Peripheral for SoftdevicePeripheral {
    type Link = SoftdeviceLink;

    async fn advertise(&mut self, adv: &Advertisement) -> Result<SoftdeviceLink, TransportError> {
        Self::set_gap_name(adv.name.as_str());

        let config = peripheral::Config {
            // 0.625 ms units
            interval: adv.interval_ms * 8 / 5,
            ..Default::default()
        };
        let advertisement = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv.adv_data,
            scan_data: &adv.scan_data,
        };

        let conn = peripheral::advertise_connectable(self.sd, advertisement, &config)
            .await
            .map_err(|e| {
                warn!("advertise_connectable: {:?}", e);
                TransportError::AdvertiseFailed
            })?;

        info!("connected");
        self.subs.clear();
        self.slot.put(Some(conn.clone()));
        Ok(SoftdeviceLink {
            conn,
            server: self.server,
            slot: self.slot,
            subs: self.subs,
        })
    }
}

pub struct SoftdeviceLink {
    conn: Connection,
    server: &'static Server,
    slot: &'static ConnSlot,
    subs: &'static Subscriptions,
}

impl Link for SoftdeviceLink {
    fn peer(&self) -> PeerHandle {
        PeerHandle(self.conn.handle().unwrap_or(u16::MAX))
    }

    async fn serve(&self, inboxes: &Inboxes) -> TransportError {
        let subs = self.subs;
        // Returns when the connection is gone.
        let _ = gatt_server::run(&self.conn, self.server, |e| match e {
            ServerEvent::Uart(e) => match e {
                UartServiceEvent::RxWrite(v) => inboxes.capture(ChannelId::UartRx, &v),
                UartServiceEvent::TxCccdWrite { notifications } => {
                    subs.set(ChannelId::UartTx, notifications)
                }
            },
            ServerEvent::Project(e) => match e {
                ProjectServiceEvent::NumberWrite(v) => {
                    inboxes.capture(ChannelId::ProjectNumber, &v)
                }
                ProjectServiceEvent::KeepaliveWrite(v) => {
                    inboxes.capture(ChannelId::Keepalive, &v)
                }
            },
            ServerEvent::Battery(e) => match e {
                BatteryServiceEvent::LevelCccdWrite { notifications } => {
                    subs.set(ChannelId::Battery, notifications)
                }
            },
            #[allow(unreachable_patterns)]
            _ => {}
        })
        .await;
        self.slot.put(None);
        TransportError::Disconnected
    }

    fn disconnect(&self) {
        if self.conn.disconnect().is_err() {
            debug!("already disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.handle().is_some()
    }
}

impl Drop for SoftdeviceLink {
    fn drop(&mut self) {
        self.slot.put(None);
        self.subs.clear();
    }
}

/// Pushes values through the GATT server to whoever holds the slot.
pub struct SoftdeviceOutbound {
    server: &'static Server,
    slot: &'static ConnSlot,
    subs: &'static Subscriptions,
}

impl SoftdeviceOutbound {
    pub fn new(
        server: &'static Server,
        slot: &'static ConnSlot,
        subs: &'static Subscriptions,
    ) -> Self {
        Self { server, slot, subs }
    }
}

fn notify_error(e: NotifyValueError) -> TransportError {
    match e {
        NotifyValueError::Disconnected => TransportError::Disconnected,
        NotifyValueError::Raw(raw) => TransportError::Raw(raw as u32),
    }
}

fn level(data: &[u8]) -> Result<i16, TransportError> {
    match data {
        [lo, hi] => Ok(i16::from_le_bytes([*lo, *hi])),
        _ => Err(TransportError::NotifyFailed),
    }
}

impl Outbound for SoftdeviceOutbound {
    fn notify(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError> {
        let conn = self.slot.get().ok_or(TransportError::Disconnected)?;
        if !self.subs.enabled(channel) {
            return Ok(());
        }
        match channel {
            ChannelId::UartTx => {
                let v = Vec::from_slice(data).map_err(|_| TransportError::NotifyFailed)?;
                self.server.uart.tx_notify(&conn, &v).map_err(notify_error)
            }
            ChannelId::Battery => self
                .server
                .battery
                .level_notify(&conn, &level(data)?)
                .map_err(notify_error),
            _ => Err(TransportError::NotifyFailed),
        }
    }

    fn set(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError> {
        let r = match channel {
            ChannelId::UartTx => {
                let v = Vec::from_slice(data).map_err(|_| TransportError::NotifyFailed)?;
                self.server.uart.tx_set(&v)
            }
            ChannelId::ProjectNumber => {
                let v = Vec::from_slice(data).map_err(|_| TransportError::NotifyFailed)?;
                self.server.project.number_set(&v)
            }
            ChannelId::Battery => self.server.battery.level_set(&level(data)?),
            ChannelId::UartRx | ChannelId::Keepalive => return Err(TransportError::NotifyFailed),
        };
        r.map_err(|e| {
            warn!("gatt set: {:?}", e);
            TransportError::NotifyFailed
        })
    }
}
