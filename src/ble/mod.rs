//! Bluetooth Low Energy subsystem.
//!
//! The firmware runs the SoftDevice in **Peripheral** role with a single
//! connection slot:
//!
//! 1. **Advertising** - [`adv`] builds the payload; the device name
//!    carries the project number.
//! 2. **GATT channels** - [`channel`] defines the closed set of
//!    characteristics, their capabilities, and the write inboxes.
//! 3. **Session manager** - [`manager`] owns the advertise / connect /
//!    teardown cycle and is the only writer of the session state.
//!
//! The radio stack itself sits behind the [`Peripheral`] and [`Link`]
//! traits so everything above can be driven from host tests.

pub mod adv;
pub mod channel;
pub mod device_info;
pub mod manager;

use crate::error::TransportError;
use crate::session::PeerHandle;
use adv::Advertisement;
use channel::Inboxes;

/// The advertising side of the BLE stack.
#[allow(async_fn_in_trait)]
pub trait Peripheral {
    type Link: Link;

    /// Advertise until a central connects, then hand back the link.
    async fn advertise(&mut self, adv: &Advertisement) -> Result<Self::Link, TransportError>;
}

/// One established connection.
#[allow(async_fn_in_trait)]
pub trait Link {
    fn peer(&self) -> PeerHandle;

    /// Service GATT traffic, routing peer writes into `inboxes`, until the
    /// connection drops. Returns the reason.
    async fn serve(&self, inboxes: &Inboxes) -> TransportError;

    /// Ask the stack to drop the connection. Completion is reported by
    /// [`is_connected`](Self::is_connected) going false.
    fn disconnect(&self);

    /// Whether the stack still holds this connection.
    fn is_connected(&self) -> bool;
}
