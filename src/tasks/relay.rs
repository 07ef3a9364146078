//! UART-RX → LoRa relay.
//!
//! One message at a time: wait for a write, send it over the radio, echo
//! it back on UART-TX. The next write is not taken until the radio send
//! has finished.

use crate::ble::channel::{compose, decode_text, notify_or_log, ChannelId, Outbound, WriteInbox};
use crate::config::{IDLE_BACKOFF_MS, RADIO_STATUS_PREFIX};
use crate::error::ChannelError;
use crate::radio::{Radio, ResponseStatus};
use crate::session::{SessionId, SessionState, TeardownReason};
use crate::tasks::next_write;
use embedded_hal_async::delay::DelayNs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayEvent {
    Idle,
    SessionEnded,
    /// Handed to the radio; carries its status.
    Relayed(ResponseStatus),
    /// Unusable write; teardown requested.
    Rejected(ChannelError),
}

pub struct MessageRelay<'a, R, O, D> {
    session: &'a SessionState,
    inbox: &'a WriteInbox,
    radio: R,
    outbound: &'a O,
    delay: D,
}

impl<'a, R, O, D> MessageRelay<'a, R, O, D>
where
    R: Radio,
    O: Outbound,
    D: DelayNs,
{
    pub fn new(
        session: &'a SessionState,
        inbox: &'a WriteInbox,
        radio: R,
        outbound: &'a O,
        delay: D,
    ) -> Self {
        Self {
            session,
            inbox,
            radio,
            outbound,
            delay,
        }
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    pub async fn run_once(&mut self) -> RelayEvent {
        let Some(id) = self.session.current() else {
            self.delay.delay_ms(IDLE_BACKOFF_MS).await;
            return RelayEvent::Idle;
        };

        let payload = match next_write(self.session, id, self.inbox, &mut self.delay).await {
            Some(Ok(p)) => p,
            Some(Err(e)) => return self.reject(id, e),
            None => return RelayEvent::SessionEnded,
        };
        let text = match decode_text(&payload) {
            Ok(t) => t,
            Err(e) => return self.reject(id, e),
        };

        let status = self.radio.send_transparent(text).await;
        debug!("radio: {} -> {}", text, status.description());

        if !self.session.is_current(id) {
            return RelayEvent::Relayed(status);
        }
        notify_or_log(self.outbound, ChannelId::UartTx, text.as_bytes());
        if !status.is_success() {
            let report = compose(RADIO_STATUS_PREFIX, status.description());
            notify_or_log(self.outbound, ChannelId::UartTx, report.as_bytes());
        }
        RelayEvent::Relayed(status)
    }

    fn reject(&self, id: SessionId, e: ChannelError) -> RelayEvent {
        warn!("UART-RX write rejected: {:?}", e);
        self.session
            .request_teardown(id, TeardownReason::ProtocolError(ChannelId::UartRx));
        RelayEvent::Rejected(e)
    }
}
