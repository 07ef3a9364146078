//! Characteristic channels.
//!
//! The GATT surface is a small closed set of channels, each with a fixed
//! capability set. Peer writes arrive through [`WriteInbox`]es; values go
//! out through an [`Outbound`] implementation supplied by the transport.

use crate::config::{INBOX_DEPTH, MAX_PAYLOAD};
use crate::error::{ChannelError, Error, TransportError};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};

/// Nordic UART Service.
pub const UART_SERVICE_UUID: u128 = 0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E;
pub const UART_RX_UUID: u128 = 0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E;
pub const UART_TX_UUID: u128 = 0x6E400003_B5A3_F393_E0A9_E50E24DCCA9E;

/// Project service and its characteristics.
pub const PROJECT_SERVICE_UUID: u128 = 0x116459E5_AD1A_4D85_9B9D_FC2E6CD6B3E0;
pub const PROJECT_NUMBER_UUID: u128 = 0x116459E6_AD1A_4D85_9B9D_FC2E6CD6B3E0;
pub const KEEPALIVE_UUID: u128 = 0x116459E7_AD1A_4D85_9B9D_FC2E6CD6B3E0;

// Standard 16-bit assigned numbers.
pub const DEVICE_INFORMATION_SERVICE_UUID: u16 = 0x180A;
pub const BATTERY_SERVICE_UUID: u16 = 0x180F;
pub const BATTERY_LEVEL_UUID: u16 = 0x2A19;

/// One characteristic payload.
pub type Payload = Vec<u8, MAX_PAYLOAD>;

/// Result of waiting for the next peer write.
pub type WriteResult = Result<Payload, ChannelError>;

/// Text notified on UART-TX.
pub type Text = String<MAX_PAYLOAD>;

/// The application channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelId {
    /// Peer → firmware text to relay over LoRa.
    UartRx,
    /// Firmware → peer status and echo text.
    UartTx,
    /// Persisted project number.
    ProjectNumber,
    /// Application-level heartbeat from the peer.
    Keepalive,
    /// Battery percentage.
    Battery,
}

/// What the peer may do with a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub readable: bool,
    pub writable: bool,
    pub notifiable: bool,
}

impl ChannelId {
    pub const ALL: [ChannelId; 5] = [
        ChannelId::UartRx,
        ChannelId::UartTx,
        ChannelId::ProjectNumber,
        ChannelId::Keepalive,
        ChannelId::Battery,
    ];

    pub const fn capabilities(self) -> Capabilities {
        let (readable, writable, notifiable) = match self {
            ChannelId::UartRx => (false, true, false),
            ChannelId::UartTx => (true, false, true),
            ChannelId::ProjectNumber => (true, true, false),
            ChannelId::Keepalive => (false, true, false),
            ChannelId::Battery => (true, false, true),
        };
        Capabilities {
            readable,
            writable,
            notifiable,
        }
    }
}

/// Outgoing side of the GATT server, implemented by the transport.
///
/// Both operations are non-blocking. Notifying while the peer has not
/// subscribed is not an error; there is simply nobody to deliver to.
pub trait Outbound {
    /// Push `data` to the connected peer.
    fn notify(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError>;

    /// Replace the value the peer reads, without notifying.
    fn set(&self, channel: ChannelId, data: &[u8]) -> Result<(), TransportError>;
}

/// Notify after checking the channel's capabilities.
pub fn notify_checked<O: Outbound + ?Sized>(
    out: &O,
    channel: ChannelId,
    data: &[u8],
) -> Result<(), Error> {
    if !channel.capabilities().notifiable {
        return Err(ChannelError::Unsupported(channel).into());
    }
    out.notify(channel, data)?;
    Ok(())
}

/// Fire-and-forget notification: failures are logged and swallowed.
pub fn notify_or_log<O: Outbound + ?Sized>(out: &O, channel: ChannelId, data: &[u8]) {
    if let Err(e) = notify_checked(out, channel, data) {
        warn!("notify on {:?} failed: {:?}", channel, e);
    }
}

/// Update a readable value; failures are logged and swallowed.
pub fn set_or_log<O: Outbound + ?Sized>(out: &O, channel: ChannelId, data: &[u8]) {
    if !channel.capabilities().readable {
        warn!("{:?} is not readable", channel);
        return;
    }
    if let Err(e) = out.set(channel, data) {
        warn!("set on {:?} failed: {:?}", channel, e);
    }
}

/// Interpret a payload as UTF-8 text.
pub fn decode_text(payload: &[u8]) -> Result<&str, ChannelError> {
    core::str::from_utf8(payload).map_err(|_| ChannelError::NotText)
}

/// `prefix` followed by `body`, cut on a character boundary if the
/// result would not fit in one notification.
pub fn compose(prefix: &str, body: &str) -> Text {
    let mut t = Text::new();
    for c in prefix.chars().chain(body.chars()) {
        if t.push(c).is_err() {
            break;
        }
    }
    t
}

/// Queue of captured peer writes for one writable channel.
///
/// The transport calls [`capture`](Self::capture) from its event
/// callback; the owning task awaits [`written`](Self::written).
pub struct WriteInbox {
    channel: ChannelId,
    queue: Channel<CriticalSectionRawMutex, WriteResult, INBOX_DEPTH>,
}

impl WriteInbox {
    pub const fn new(channel: ChannelId) -> Self {
        Self {
            channel,
            queue: Channel::new(),
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Record a peer write. Never blocks; drops the write if the owning
    /// task is too far behind.
    pub fn capture(&self, data: &[u8]) {
        let item = Payload::from_slice(data).map_err(|_| ChannelError::Oversized);
        if self.queue.try_send(item).is_err() {
            warn!("{:?} inbox full - dropping write", self.channel);
        }
    }

    /// Wait for the next peer write.
    pub async fn written(&self) -> WriteResult {
        self.queue.receive().await
    }

    /// Drop everything captured so far. Returns the number discarded.
    pub fn discard(&self) -> usize {
        let mut n = 0;
        while self.queue.try_receive().is_ok() {
            n += 1;
        }
        n
    }
}

/// Inboxes for every writable channel.
pub struct Inboxes {
    pub uart_rx: WriteInbox,
    pub project_number: WriteInbox,
    pub keepalive: WriteInbox,
}

impl Inboxes {
    pub const fn new() -> Self {
        Self {
            uart_rx: WriteInbox::new(ChannelId::UartRx),
            project_number: WriteInbox::new(ChannelId::ProjectNumber),
            keepalive: WriteInbox::new(ChannelId::Keepalive),
        }
    }

    /// Route a peer write to its channel's inbox.
    pub fn capture(&self, channel: ChannelId, data: &[u8]) {
        match channel {
            ChannelId::UartRx => self.uart_rx.capture(data),
            ChannelId::ProjectNumber => self.project_number.capture(data),
            ChannelId::Keepalive => self.keepalive.capture(data),
            ChannelId::UartTx | ChannelId::Battery => {
                warn!("ignoring write to read-only {:?}", channel);
            }
        }
    }

    /// Forget writes left over from a previous session.
    pub fn discard_all(&self) {
        let n = self.uart_rx.discard()
            + self.project_number.discard()
            + self.keepalive.discard();
        if n > 0 {
            debug!("discarded {} stale writes", n);
        }
    }
}

impl Default for Inboxes {
    fn default() -> Self {
        Self::new()
    }
}
