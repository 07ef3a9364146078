//! Shared connection state.
//!
//! One [`SessionState`] lives for the whole program and is shared by
//! reference with every task. Fields are single-writer:
//!
//! | Field                  | Writer                 |
//! |------------------------|------------------------|
//! | active session / peer  | session manager        |
//! | phase, advertised name | session manager        |
//! | missed keepalives      | liveness monitor       |
//!
//! The active session id and "connected" are the same atomic word, so a
//! reader can never see a peer without a session or the reverse. Readers
//! must re-check after every suspension point; [`SessionState::wait_ended`]
//! is the primitive for abandoning a wait when the session goes away.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use crate::ble::adv::DeviceName;
use crate::ble::channel::ChannelId;
use crate::config::IDLE_BACKOFF_MS;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;

const NO_SESSION: u32 = 0;
const NO_PEER: u16 = u16::MAX;

/// Identifies one accepted connection. Never reused while the firmware runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionId(u32);

impl SessionId {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// Transport-assigned connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerHandle(pub u16);

/// Where the session manager is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SessionPhase {
    Idle = 0,
    Advertising = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl SessionPhase {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionPhase::Advertising,
            2 => SessionPhase::Connected,
            3 => SessionPhase::Disconnecting,
            _ => SessionPhase::Idle,
        }
    }
}

/// Why a task asked the session manager to drop the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TeardownReason {
    /// Too many keepalives missed; the peer probably vanished.
    LivenessExpired,
    /// The peer wrote something unusable to this channel.
    ProtocolError(ChannelId),
}

#[derive(Clone, Copy)]
struct Teardown {
    session: SessionId,
    reason: TeardownReason,
}

pub struct SessionState {
    active: AtomicU32,
    last_id: AtomicU32,
    peer: AtomicU16,
    phase: AtomicU8,
    missed_keepalives: AtomicU8,
    advertised_name: Mutex<CriticalSectionRawMutex, RefCell<DeviceName>>,
    teardown: Signal<CriticalSectionRawMutex, Teardown>,
}

impl SessionState {
    pub const fn new() -> Self {
        Self {
            active: AtomicU32::new(NO_SESSION),
            last_id: AtomicU32::new(NO_SESSION),
            peer: AtomicU16::new(NO_PEER),
            phase: AtomicU8::new(SessionPhase::Idle as u8),
            missed_keepalives: AtomicU8::new(0),
            advertised_name: Mutex::new(RefCell::new(DeviceName::new())),
            teardown: Signal::new(),
        }
    }

    // Readers

    pub fn is_connected(&self) -> bool {
        self.active.load(Ordering::Acquire) != NO_SESSION
    }

    /// The session currently holding the peer, if any.
    pub fn current(&self) -> Option<SessionId> {
        match self.active.load(Ordering::Acquire) {
            NO_SESSION => None,
            id => Some(SessionId(id)),
        }
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.active.load(Ordering::Acquire) == id.0
    }

    pub fn peer(&self) -> Option<PeerHandle> {
        match self.peer.load(Ordering::Acquire) {
            NO_PEER => None,
            h => Some(PeerHandle(h)),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn missed_keepalives(&self) -> u8 {
        self.missed_keepalives.load(Ordering::Acquire)
    }

    /// Name captured when the current (or last) advertisement started.
    pub fn advertised_name(&self) -> DeviceName {
        self.advertised_name.lock(|n| n.borrow().clone())
    }

    /// Resolve once `id` is no longer the active session, re-checking
    /// after every backoff sleep.
    pub async fn wait_ended<D: DelayNs>(&self, id: SessionId, delay: &mut D) {
        while self.is_current(id) {
            delay.delay_ms(IDLE_BACKOFF_MS).await;
        }
    }

    /// Ask the session manager to drop `id`. Ignored if `id` is stale.
    pub(crate) fn request_teardown(&self, id: SessionId, reason: TeardownReason) {
        if self.is_current(id) {
            self.teardown.signal(Teardown { session: id, reason });
        }
    }

    // Session manager

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub(crate) fn set_advertised_name(&self, name: &DeviceName) {
        self.advertised_name
            .lock(|n| n.borrow_mut().clone_from(name));
    }

    /// Publish a freshly accepted peer as the active session.
    pub(crate) fn begin(&self, peer: PeerHandle) -> SessionId {
        let mut id = self.last_id.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        if id == NO_SESSION {
            id = self.last_id.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        }
        self.missed_keepalives.store(0, Ordering::Release);
        self.peer.store(peer.0, Ordering::Release);
        self.teardown.reset();
        self.active.store(id, Ordering::Release);
        self.set_phase(SessionPhase::Connected);
        SessionId(id)
    }

    /// Reset every per-session field; `connected` goes false here and
    /// nowhere else.
    pub(crate) fn end(&self) {
        self.active.store(NO_SESSION, Ordering::Release);
        self.peer.store(NO_PEER, Ordering::Release);
        self.missed_keepalives.store(0, Ordering::Release);
        self.teardown.reset();
        self.set_phase(SessionPhase::Idle);
    }

    /// Wait for a teardown request aimed at `id`.
    pub(crate) async fn teardown_requested(&self, id: SessionId) -> TeardownReason {
        loop {
            let t = self.teardown.wait().await;
            if t.session == id {
                return t.reason;
            }
        }
    }

    // Liveness monitor

    pub(crate) fn record_missed_keepalive(&self) -> u8 {
        self.missed_keepalives
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    pub(crate) fn reset_missed_keepalives(&self) {
        self.missed_keepalives.store(0, Ordering::Release);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
