//! Integration tests for ble2lora host-testable logic.
//!
//! Each scenario runs the session manager next to the task loops it
//! drives, with a scripted BLE peer, radio and flash standing in for the
//! hardware. Every delay completes after one yield, so a "window" is a
//! single round of polling.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use ble2lora::battery::{percentage, BatteryReading};
use ble2lora::ble::adv::Advertisement;
use ble2lora::ble::channel::{ChannelId, Inboxes, Outbound};
use ble2lora::ble::manager::SessionManager;
use ble2lora::ble::{Link, Peripheral};
use ble2lora::project::{load_or_init, ProjectCell, ProjectId, ProjectStore};
use ble2lora::radio::{Radio, ResponseStatus};
use ble2lora::session::{PeerHandle, SessionState};
use ble2lora::tasks::liveness::LivenessMonitor;
use ble2lora::tasks::project::ProjectConfigurator;
use ble2lora::tasks::relay::MessageRelay;
use ble2lora::{StoreError, TransportError};
use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::select::select;
use embassy_futures::yield_now;
use embedded_hal_async::delay::DelayNs;

// ═══════════════════════════════════════════════════════════════════════════
// Fakes
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Default)]
struct Tick;

impl DelayNs for Tick {
    async fn delay_ns(&mut self, _ns: u32) {
        yield_now().await;
    }
}

/// The phone on the other end of the link.
#[derive(Default)]
struct Phone {
    pending: RefCell<VecDeque<PeerHandle>>,
    advertised: RefCell<Vec<String>>,
    writes: RefCell<VecDeque<(ChannelId, Vec<u8>)>>,
    hang_up: Cell<bool>,
    kicked: Cell<usize>,
}

impl Phone {
    fn connect(&self, peer: u16) {
        self.pending.borrow_mut().push_back(PeerHandle(peer));
    }

    fn write(&self, channel: ChannelId, data: &[u8]) {
        self.writes.borrow_mut().push_back((channel, data.to_vec()));
    }

    fn hang_up(&self) {
        self.hang_up.set(true);
    }

    fn advertised(&self) -> Vec<String> {
        self.advertised.borrow().clone()
    }
}

struct Air<'a>(&'a Phone);

impl<'a> Peripheral for Air<'a> {
    type Link = Call<'a>;

    async fn advertise(&mut self, adv: &Advertisement) -> Result<Call<'a>, TransportError> {
        self.0.advertised.borrow_mut().push(adv.name.as_str().to_owned());
        loop {
            let next = self.0.pending.borrow_mut().pop_front();
            if let Some(peer) = next {
                self.0.hang_up.set(false);
                return Ok(Call {
                    peer,
                    phone: self.0,
                    closed: Cell::new(false),
                });
            }
            yield_now().await;
        }
    }
}

struct Call<'a> {
    peer: PeerHandle,
    phone: &'a Phone,
    closed: Cell<bool>,
}

impl Link for Call<'_> {
    fn peer(&self) -> PeerHandle {
        self.peer
    }

    async fn serve(&self, inboxes: &Inboxes) -> TransportError {
        loop {
            let next = self.phone.writes.borrow_mut().pop_front();
            if let Some((ch, data)) = next {
                inboxes.capture(ch, &data);
                continue;
            }
            if self.phone.hang_up.replace(false) {
                return TransportError::Disconnected;
            }
            yield_now().await;
        }
    }

    fn disconnect(&self) {
        self.phone.kicked.set(self.phone.kicked.get() + 1);
        self.closed.set(true);
    }

    fn is_connected(&self) -> bool {
        !self.closed.get()
    }
}

#[derive(Default)]
struct Screen {
    notified: RefCell<Vec<(ChannelId, Vec<u8>)>>,
    values: RefCell<Vec<(ChannelId, Vec<u8>)>>,
}

impl Screen {
    fn uart_tx(&self) -> Vec<String> {
        self.notified
            .borrow()
            .iter()
            .filter(|(c, _)| *c == ChannelId::UartTx)
            .map(|(_, d)| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    fn value(&self, channel: ChannelId) -> Option<Vec<u8>> {
        self.values
            .borrow()
            .iter()
            .rev()
            .find(|(c, _)| *c == channel)
            .map(|(_, d)| d.clone())
    }
}

impl Outbound for Screen {
    fn notify(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError> {
        self.notified.borrow_mut().push((channel, data.to_vec()));
        Ok(())
    }

    fn set(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError> {
        self.values.borrow_mut().push((channel, data.to_vec()));
        Ok(())
    }
}

struct Lora<'a>(&'a RefCell<Vec<String>>);

impl Radio for Lora<'_> {
    async fn send_transparent(&mut self, text: &str) -> ResponseStatus {
        self.0.borrow_mut().push(text.to_owned());
        ResponseStatus::Success
    }
}

#[derive(Default)]
struct Flash {
    record: RefCell<Option<String>>,
    writes: Cell<usize>,
}

struct FlashStore<'a>(&'a Flash);

impl ProjectStore for FlashStore<'_> {
    async fn load(&mut self) -> Result<Option<ProjectId>, StoreError> {
        match self.0.record.borrow().as_deref() {
            Some(v) => ProjectId::parse(v.as_bytes())
                .map(Some)
                .map_err(|_| StoreError::Corrupt),
            None => Ok(None),
        }
    }

    async fn save(&mut self, id: &ProjectId) -> Result<(), StoreError> {
        *self.0.record.borrow_mut() = Some(id.as_str().to_owned());
        self.0.writes.set(self.0.writes.get() + 1);
        Ok(())
    }
}

struct Bridge {
    phone: Phone,
    screen: Screen,
    session: SessionState,
    project: ProjectCell,
    inboxes: Inboxes,
}

impl Bridge {
    fn new() -> Self {
        Self {
            phone: Phone::default(),
            screen: Screen::default(),
            session: SessionState::new(),
            project: ProjectCell::new(),
            inboxes: Inboxes::new(),
        }
    }

    fn manager(&self) -> SessionManager<'_, Air<'_>, Screen, Tick> {
        SessionManager::new(
            Air(&self.phone),
            &self.screen,
            Tick,
            &self.session,
            &self.project,
            &self.inboxes,
        )
    }

    /// Poll until `cond` holds, panicking if it never does.
    async fn until(&self, what: &str, cond: impl Fn() -> bool) {
        for _ in 0..10_000 {
            if cond() {
                return;
            }
            yield_now().await;
        }
        panic!("timed out waiting for {what}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn hello_is_relayed_and_echoed() {
    let bridge = Bridge::new();
    let sent = RefCell::new(Vec::new());
    let mut manager = bridge.manager();
    let mut relay = MessageRelay::new(
        &bridge.session,
        &bridge.inboxes.uart_rx,
        Lora(&sent),
        &bridge.screen,
        Tick,
    );

    bridge.phone.connect(1);
    block_on(select(
        async {
            bridge.until("connect", || bridge.session.is_connected()).await;
            bridge.phone.write(ChannelId::UartRx, b"Hello");
            bridge
                .until("echo", || bridge.screen.uart_tx().iter().any(|t| t == "Hello"))
                .await;
        },
        join(manager.run(), relay.run()),
    ));

    assert_eq!(*sent.borrow(), ["Hello"]);
    assert!(bridge.session.is_connected());
}

#[test]
fn new_project_number_renames_next_advertisement() {
    let bridge = Bridge::new();
    let flash = Flash::default();
    let mut manager = bridge.manager();
    let mut configurator = ProjectConfigurator::new(
        &bridge.session,
        &bridge.inboxes.project_number,
        FlashStore(&flash),
        &bridge.project,
        &bridge.screen,
        Tick,
    );

    bridge.phone.connect(1);
    block_on(select(
        async {
            bridge.until("connect", || bridge.session.is_connected()).await;
            bridge.phone.write(ChannelId::ProjectNumber, b"230404");
            bridge
                .until("confirmation", || {
                    bridge
                        .screen
                        .uart_tx()
                        .iter()
                        .any(|t| t == "Received New Project: 230404")
                })
                .await;

            // Still connected under the old name.
            assert_eq!(
                bridge.session.advertised_name().as_str(),
                "AusSport Sboard P000000"
            );

            bridge.phone.hang_up();
            bridge
                .until("re-advertise", || bridge.phone.advertised().len() == 2)
                .await;
        },
        join(manager.run(), configurator.run()),
    ));

    assert_eq!(
        bridge.phone.advertised(),
        ["AusSport Sboard P000000", "AusSport Sboard P230404"]
    );
    assert_eq!(flash.record.borrow().as_deref(), Some("230404"));
    assert_eq!(
        bridge.screen.value(ChannelId::ProjectNumber).as_deref(),
        Some(&b"230404"[..])
    );
}

#[test]
fn same_project_number_twice_writes_flash_once() {
    let bridge = Bridge::new();
    let flash = Flash::default();
    let mut manager = bridge.manager();
    let mut configurator = ProjectConfigurator::new(
        &bridge.session,
        &bridge.inboxes.project_number,
        FlashStore(&flash),
        &bridge.project,
        &bridge.screen,
        Tick,
    );

    bridge.phone.connect(1);
    block_on(select(
        async {
            bridge.until("connect", || bridge.session.is_connected()).await;
            bridge.phone.write(ChannelId::ProjectNumber, b"42");
            bridge.phone.write(ChannelId::ProjectNumber, b"42");
            bridge
                .until("two confirmations", || {
                    bridge
                        .screen
                        .uart_tx()
                        .iter()
                        .filter(|t| *t == "Received New Project: 42")
                        .count()
                        == 2
                })
                .await;
        },
        join(manager.run(), configurator.run()),
    ));

    assert_eq!(flash.writes.get(), 1);
    assert_eq!(bridge.project.get().as_str(), "42");
}

#[test]
fn silent_peer_is_dropped_after_three_missed_keepalives() {
    let bridge = Bridge::new();
    let mut manager = bridge.manager();
    let mut monitor = LivenessMonitor::new(&bridge.session, &bridge.inboxes.keepalive, Tick);

    bridge.phone.connect(1);
    block_on(select(
        async {
            bridge.until("connect", || bridge.session.is_connected()).await;
            bridge
                .until("teardown", || {
                    bridge.phone.kicked.get() == 1 && !bridge.session.is_connected()
                })
                .await;
        },
        join(manager.run(), monitor.run()),
    ));

    assert_eq!(bridge.session.missed_keepalives(), 0);
    assert_eq!(bridge.phone.advertised().len(), 2);
}

#[test]
fn answering_keepalives_keeps_the_session() {
    let bridge = Bridge::new();
    let mut manager = bridge.manager();
    let mut monitor = LivenessMonitor::new(&bridge.session, &bridge.inboxes.keepalive, Tick);

    bridge.phone.connect(1);
    block_on(select(
        async {
            bridge.until("connect", || bridge.session.is_connected()).await;
            let mut answered = 0;
            while answered < 10 {
                if bridge.session.missed_keepalives() > 0 {
                    bridge.inboxes.keepalive.capture(b"OK");
                    answered += 1;
                }
                yield_now().await;
            }
        },
        join(manager.run(), monitor.run()),
    ));

    assert!(bridge.session.is_connected());
    assert_eq!(bridge.phone.kicked.get(), 0);
}

#[test]
fn connected_always_matches_session_and_peer() {
    let bridge = Bridge::new();
    let mut manager = bridge.manager();

    block_on(select(
        async {
            for peer in 1..=5u16 {
                bridge.phone.connect(peer);
                bridge.until("connect", || bridge.session.is_connected()).await;
                for _ in 0..20 {
                    let connected = bridge.session.is_connected();
                    assert_eq!(connected, bridge.session.current().is_some());
                    assert_eq!(connected, bridge.session.peer().is_some());
                    yield_now().await;
                }
                assert_eq!(bridge.session.peer(), Some(PeerHandle(peer)));
                bridge.phone.hang_up();
                bridge.until("disconnect", || !bridge.session.is_connected()).await;
                assert_eq!(bridge.session.peer(), None);
                assert_eq!(bridge.session.current(), None);
            }
        },
        manager.run(),
    ));

    // Keep-warm text went out while connected.
    assert!(bridge
        .screen
        .uart_tx()
        .iter()
        .any(|t| t == "AusSport P000000"));
}

#[test]
fn project_number_survives_a_power_cycle() {
    let flash = Flash::default();

    let first = block_on(load_or_init(&mut FlashStore(&flash)));
    assert_eq!(first.as_str(), "000000");
    assert_eq!(flash.record.borrow().as_deref(), Some("000000"));

    let new = ProjectId::parse(b"230404").unwrap();
    block_on(FlashStore(&flash).save(&new)).unwrap();

    let after_reboot = block_on(load_or_init(&mut FlashStore(&flash)));
    assert_eq!(after_reboot, new);
    assert_eq!(flash.writes.get(), 2);
}

#[test]
fn battery_percentage_is_clamped() {
    assert_eq!(percentage(2.0), 0.0);
    assert_eq!(percentage(2.8), 0.0);
    assert!((percentage(3.5) - 50.0).abs() < 0.01);
    assert_eq!(percentage(4.2), 100.0);
    assert_eq!(percentage(5.0), 100.0);

    assert_eq!(BatteryReading::from_voltage(4.5).encode(), [100, 0]);
    assert_eq!(BatteryReading::from_raw(-12).encode(), [0, 0]);
}
