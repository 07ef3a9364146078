//! Host-side fakes for the capability traits.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use crate::ble::adv::Advertisement;
use crate::ble::channel::{ChannelId, Inboxes, Outbound};
use crate::ble::{Link, Peripheral};
use crate::error::{StoreError, TransportError};
use crate::project::{ProjectId, ProjectStore};
use crate::radio::{Radio, ResponseStatus};
use crate::session::PeerHandle;
use crate::tasks::battery::BatterySensor;
use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;

/// Give every other future in a `join` a few polls.
pub async fn settle() {
    for _ in 0..8 {
        yield_now().await;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Time
// ═══════════════════════════════════════════════════════════════════════════

/// Delay that completes after a single yield and adds the requested time
/// to a clock shared by all clones.
#[derive(Clone, Default)]
pub struct VirtualDelay {
    now_ns: Rc<Cell<u64>>,
}

impl VirtualDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }

    async fn advance(&mut self, ns: u64) {
        self.now_ns.set(self.now_ns.get() + ns);
        yield_now().await;
    }
}

impl DelayNs for VirtualDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance(ns as u64).await
    }

    async fn delay_us(&mut self, us: u32) {
        self.advance(us as u64 * 1_000).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64 * 1_000_000).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GATT outbound
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct RecordingOutbound {
    notified: RefCell<Vec<(ChannelId, Vec<u8>)>>,
    values: RefCell<Vec<(ChannelId, Vec<u8>)>>,
    fail: Cell<bool>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_notifications(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn notified(&self) -> Vec<(ChannelId, Vec<u8>)> {
        self.notified.borrow().clone()
    }

    /// Notifications on `channel`, as text.
    pub fn texts(&self, channel: ChannelId) -> Vec<String> {
        self.notified
            .borrow()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, d)| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    /// Last value set on `channel`.
    pub fn value(&self, channel: ChannelId) -> Option<Vec<u8>> {
        self.values
            .borrow()
            .iter()
            .rev()
            .find(|(c, _)| *c == channel)
            .map(|(_, d)| d.clone())
    }
}

impl Outbound for RecordingOutbound {
    fn notify(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError> {
        if self.fail.get() {
            return Err(TransportError::NotifyFailed);
        }
        self.notified.borrow_mut().push((channel, data.to_vec()));
        Ok(())
    }

    fn set(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError> {
        self.values.borrow_mut().push((channel, data.to_vec()));
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Transport
// ═══════════════════════════════════════════════════════════════════════════

/// Script for [`FakePeripheral`] / [`FakeLink`], shared with the test body.
#[derive(Default)]
pub struct LinkControl {
    outcomes: RefCell<VecDeque<Result<PeerHandle, TransportError>>>,
    advertised: RefCell<Vec<String>>,
    writes: RefCell<VecDeque<(ChannelId, Vec<u8>)>>,
    dropped: Cell<Option<TransportError>>,
    disconnects: Cell<usize>,
    hold: Cell<bool>,
}

impl LinkControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next advertise call yields a connection from `peer`.
    pub fn accept(&self, peer: PeerHandle) {
        self.outcomes.borrow_mut().push_back(Ok(peer));
    }

    /// Next advertise call fails.
    pub fn refuse(&self, e: TransportError) {
        self.outcomes.borrow_mut().push_back(Err(e));
    }

    pub fn peer_write(&self, channel: ChannelId, data: &[u8]) {
        self.writes.borrow_mut().push_back((channel, data.to_vec()));
    }

    /// The transport drops the current link.
    pub fn drop_link(&self, e: TransportError) {
        self.dropped.set(Some(e));
    }

    /// While set, the link stays up after a local disconnect request.
    pub fn hold_link(&self, hold: bool) {
        self.hold.set(hold);
    }

    /// Local disconnect requests seen so far.
    pub fn disconnects(&self) -> usize {
        self.disconnects.get()
    }

    pub fn advertised_names(&self) -> Vec<String> {
        self.advertised.borrow().clone()
    }
}

pub struct FakePeripheral<'a> {
    ctl: &'a LinkControl,
}

impl<'a> FakePeripheral<'a> {
    pub fn new(ctl: &'a LinkControl) -> Self {
        Self { ctl }
    }
}

impl<'a> Peripheral for FakePeripheral<'a> {
    type Link = FakeLink<'a>;

    async fn advertise(&mut self, adv: &Advertisement) -> Result<FakeLink<'a>, TransportError> {
        self.ctl
            .advertised
            .borrow_mut()
            .push(String::from(adv.name.as_str()));
        loop {
            let next = self.ctl.outcomes.borrow_mut().pop_front();
            match next {
                Some(Ok(peer)) => {
                    return Ok(FakeLink {
                        peer,
                        ctl: self.ctl,
                        closed: Cell::new(false),
                    })
                }
                Some(Err(e)) => return Err(e),
                None => yield_now().await,
            }
        }
    }
}

pub struct FakeLink<'a> {
    peer: PeerHandle,
    ctl: &'a LinkControl,
    closed: Cell<bool>,
}

impl Link for FakeLink<'_> {
    fn peer(&self) -> PeerHandle {
        self.peer
    }

    async fn serve(&self, inboxes: &Inboxes) -> TransportError {
        loop {
            loop {
                let next = self.ctl.writes.borrow_mut().pop_front();
                match next {
                    Some((ch, data)) => inboxes.capture(ch, &data),
                    None => break,
                }
            }
            if let Some(e) = self.ctl.dropped.take() {
                return e;
            }
            yield_now().await;
        }
    }

    fn disconnect(&self) {
        self.ctl.disconnects.set(self.ctl.disconnects.get() + 1);
        self.closed.set(true);
    }

    fn is_connected(&self) -> bool {
        !self.closed.get() || self.ctl.hold.get()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Storage
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct MemoryStore {
    value: Option<String>,
    writes: usize,
    fail_loads: bool,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(v: &str) -> Self {
        Self {
            value: Some(String::from(v)),
            ..Self::default()
        }
    }

    pub fn value(&self) -> Option<String> {
        self.value.clone()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn fail_loads(&mut self, fail: bool) {
        self.fail_loads = fail;
    }

    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }
}

impl ProjectStore for MemoryStore {
    async fn load(&mut self) -> Result<Option<ProjectId>, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Flash);
        }
        match &self.value {
            Some(v) => ProjectId::parse(v.as_bytes())
                .map(Some)
                .map_err(|_| StoreError::Corrupt),
            None => Ok(None),
        }
    }

    async fn save(&mut self, id: &ProjectId) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Flash);
        }
        self.value = Some(String::from(id.as_str()));
        self.writes += 1;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Radio
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct FakeRadio {
    status: Option<ResponseStatus>,
    sent: Vec<String>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send reports `status`.
    pub fn with_status(status: ResponseStatus) -> Self {
        Self {
            status: Some(status),
            sent: Vec::new(),
        }
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl Radio for FakeRadio {
    async fn send_transparent(&mut self, text: &str) -> ResponseStatus {
        self.sent.push(String::from(text));
        self.status.unwrap_or(ResponseStatus::Success)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Board
// ═══════════════════════════════════════════════════════════════════════════

/// ADC stand-in returning scripted samples, repeating the last one.
pub struct FakeSensor {
    samples: VecDeque<i16>,
    last: i16,
    usb: bool,
}

impl FakeSensor {
    pub fn new(samples: &[i16]) -> Self {
        Self {
            samples: samples.iter().copied().collect(),
            last: 0,
            usb: false,
        }
    }

    pub fn with_usb(mut self, on: bool) -> Self {
        self.usb = on;
        self
    }
}

impl BatterySensor for FakeSensor {
    async fn sample(&mut self) -> i16 {
        if let Some(s) = self.samples.pop_front() {
            self.last = s;
        }
        self.last
    }

    fn usb_powered(&mut self) -> bool {
        self.usb
    }
}

/// Output pin recording every level change.
#[derive(Clone, Default)]
pub struct RecordingPin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}
