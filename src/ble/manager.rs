//! Session manager: advertise → accept → monitor → teardown.
//!
//! The manager is the only code that opens or closes a session. A session
//! ends when the first of these fires:
//!
//! 1. the transport reports a disconnect (checked first, so it wins a tie);
//! 2. another task requests a teardown for this session id;
//! 3. the keep-warm notification fails.

use crate::ble::adv::Advertisement;
use crate::ble::channel::{compose, notify_checked, ChannelId, Inboxes, Outbound};
use crate::ble::{Link, Peripheral};
use crate::config::{
    ADVERTISE_RETRY_MS, DISCONNECT_TIMEOUT_MS, IDLE_BACKOFF_MS, KEEP_WARM_INTERVAL_MS,
    KEEP_WARM_PREFIX,
};
use crate::error::{Error, TransportError};
use crate::project::ProjectCell;
use crate::session::{SessionPhase, SessionState, TeardownReason};
use embassy_futures::select::{select3, Either3};
use embedded_hal_async::delay::DelayNs;

/// How a session finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEnd {
    /// The transport dropped the link.
    PeerDisconnected(TransportError),
    /// Torn down locally at another task's request.
    Forced(TeardownReason),
    /// The keep-warm notification could not be sent.
    KeepWarmFailed(Error),
}

pub struct SessionManager<'a, P, O, D> {
    peripheral: P,
    outbound: &'a O,
    delay: D,
    session: &'a SessionState,
    project: &'a ProjectCell,
    inboxes: &'a Inboxes,
}

impl<'a, P, O, D> SessionManager<'a, P, O, D>
where
    P: Peripheral,
    O: Outbound,
    D: DelayNs,
{
    pub fn new(
        peripheral: P,
        outbound: &'a O,
        delay: D,
        session: &'a SessionState,
        project: &'a ProjectCell,
        inboxes: &'a Inboxes,
    ) -> Self {
        Self {
            peripheral,
            outbound,
            delay,
            session,
            project,
            inboxes,
        }
    }

    /// Run sessions forever. A failed advertise is retried after a pause.
    pub async fn run(&mut self) -> ! {
        loop {
            match self.run_session().await {
                Ok(SessionEnd::PeerDisconnected(e)) => info!("peer disconnected: {:?}", e),
                Ok(SessionEnd::Forced(reason)) => warn!("session torn down: {:?}", reason),
                Ok(SessionEnd::KeepWarmFailed(e)) => warn!("keep-warm failed: {:?}", e),
                Err(e) => {
                    error!("advertising failed: {:?}", e);
                    self.delay.delay_ms(ADVERTISE_RETRY_MS).await;
                }
            }
        }
    }

    /// One full cycle. Returns `Err` only if advertising itself failed,
    /// in which case no session was started.
    pub async fn run_session(&mut self) -> Result<SessionEnd, TransportError> {
        let adv = Advertisement::for_project(&self.project.get());
        self.session.set_advertised_name(&adv.name);
        self.session.set_phase(SessionPhase::Advertising);
        info!("advertising as {}", adv.name.as_str());

        let link = match self.peripheral.advertise(&adv).await {
            Ok(link) => link,
            Err(e) => {
                self.session.set_phase(SessionPhase::Idle);
                return Err(e);
            }
        };

        self.inboxes.discard_all();
        let peer = link.peer();
        let id = self.session.begin(peer);
        info!("session {} started (peer {})", id.get(), peer.0);

        let outcome = select3(
            link.serve(self.inboxes),
            self.session.teardown_requested(id),
            keep_warm(self.outbound, self.project, &mut self.delay),
        )
        .await;

        let end = match outcome {
            Either3::First(e) => SessionEnd::PeerDisconnected(e),
            Either3::Second(reason) => SessionEnd::Forced(reason),
            Either3::Third(e) => SessionEnd::KeepWarmFailed(e),
        };
        if !matches!(end, SessionEnd::PeerDisconnected(_)) {
            self.session.set_phase(SessionPhase::Disconnecting);
            link.disconnect();
            self.await_disconnect(&link).await;
        }

        self.session.end();
        Ok(end)
    }

    /// Keep the session open until the stack has released the link, for
    /// at most [`DISCONNECT_TIMEOUT_MS`].
    async fn await_disconnect(&mut self, link: &P::Link) {
        let mut waited = 0;
        while link.is_connected() {
            if waited >= DISCONNECT_TIMEOUT_MS {
                warn!("link still up {} ms after disconnect", waited);
                return;
            }
            self.delay.delay_ms(IDLE_BACKOFF_MS).await;
            waited += IDLE_BACKOFF_MS;
        }
    }
}

/// Notify `"AusSport P" + project` on UART-TX every interval. Only
/// returns on failure.
async fn keep_warm<O: Outbound, D: DelayNs>(out: &O, project: &ProjectCell, delay: &mut D) -> Error {
    loop {
        delay.delay_ms(KEEP_WARM_INTERVAL_MS).await;
        let text = compose(KEEP_WARM_PREFIX, project.get().as_str());
        if let Err(e) = notify_checked(out, ChannelId::UartTx, text.as_bytes()) {
            return e;
        }
        trace!("keep-warm sent");
    }
}
