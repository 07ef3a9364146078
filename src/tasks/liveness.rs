//! Application-level keepalive.
//!
//! The transport may take a long time to notice a vanished peer, so while
//! a session is active the peer must write `"OK"` to the keepalive channel
//! at least once per timeout window. A window with no write, or with any
//! other payload, counts as missed. Reaching the limit asks the session
//! manager to drop the link, after which this session is left alone.

use crate::ble::channel::WriteInbox;
use crate::config::{IDLE_BACKOFF_MS, KEEPALIVE_TIMEOUT_MS, KEEPALIVE_TOKEN, MAX_MISSED_KEEPALIVES};
use crate::session::{SessionId, SessionState, TeardownReason};
use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LivenessEvent {
    /// No session to monitor.
    Idle,
    /// Valid keepalive; counter reset.
    Acknowledged,
    /// Window missed; running count.
    Missed(u8),
    /// Limit reached, teardown requested.
    Expired,
}

pub struct LivenessMonitor<'a, D> {
    session: &'a SessionState,
    inbox: &'a WriteInbox,
    delay: D,
    expired: Option<SessionId>,
}

impl<'a, D: DelayNs> LivenessMonitor<'a, D> {
    pub fn new(session: &'a SessionState, inbox: &'a WriteInbox, delay: D) -> Self {
        Self {
            session,
            inbox,
            delay,
            expired: None,
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    pub async fn run_once(&mut self) -> LivenessEvent {
        let id = match self.session.current() {
            Some(id) if self.expired != Some(id) => id,
            _ => {
                self.delay.delay_ms(IDLE_BACKOFF_MS).await;
                return LivenessEvent::Idle;
            }
        };

        let outcome = select(
            self.inbox.written(),
            self.delay.delay_ms(KEEPALIVE_TIMEOUT_MS),
        )
        .await;

        if !self.session.is_current(id) {
            return LivenessEvent::Idle;
        }

        let acknowledged = match outcome {
            Either::First(Ok(payload)) => payload.as_slice() == KEEPALIVE_TOKEN,
            Either::First(Err(e)) => {
                debug!("bad keepalive write: {:?}", e);
                false
            }
            Either::Second(()) => false,
        };

        if acknowledged {
            self.session.reset_missed_keepalives();
            trace!("keepalive ok");
            return LivenessEvent::Acknowledged;
        }

        let missed = self.session.record_missed_keepalive();
        if missed < MAX_MISSED_KEEPALIVES {
            info!("keepalive missed ({}/{})", missed, MAX_MISSED_KEEPALIVES);
            return LivenessEvent::Missed(missed);
        }

        warn!("peer stopped answering keepalives");
        self.session
            .request_teardown(id, TeardownReason::LivenessExpired);
        self.expired = Some(id);
        LivenessEvent::Expired
    }
}
