//! Project-Number writes.
//!
//! A valid write replaces the in-memory project number, persists it, and is
//! confirmed on UART-TX. The device name only changes on the next
//! advertisement.

use crate::ble::channel::{compose, notify_or_log, set_or_log, ChannelId, Outbound, WriteInbox};
use crate::config::{IDLE_BACKOFF_MS, PROJECT_CONFIRM_PREFIX};
use crate::error::ChannelError;
use crate::project::{ProjectCell, ProjectId, ProjectStore};
use crate::session::{SessionState, TeardownReason};
use crate::tasks::next_write;
use embedded_hal_async::delay::DelayNs;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProjectEvent {
    Idle,
    SessionEnded,
    /// New value stored.
    Updated(ProjectId),
    /// Same value as before; flash left alone.
    Unchanged(ProjectId),
    Rejected(ChannelError),
}

pub struct ProjectConfigurator<'a, S, O, D> {
    session: &'a SessionState,
    inbox: &'a WriteInbox,
    store: S,
    project: &'a ProjectCell,
    outbound: &'a O,
    delay: D,
    /// Last value the store accepted. `None` until the first successful save.
    persisted: Option<ProjectId>,
}

impl<'a, S, O, D> ProjectConfigurator<'a, S, O, D>
where
    S: ProjectStore,
    O: Outbound,
    D: DelayNs,
{
    pub fn new(
        session: &'a SessionState,
        inbox: &'a WriteInbox,
        store: S,
        project: &'a ProjectCell,
        outbound: &'a O,
        delay: D,
    ) -> Self {
        Self {
            session,
            inbox,
            store,
            project,
            outbound,
            delay,
            persisted: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    pub async fn run_once(&mut self) -> ProjectEvent {
        let Some(id) = self.session.current() else {
            self.delay.delay_ms(IDLE_BACKOFF_MS).await;
            return ProjectEvent::Idle;
        };

        let parsed = match next_write(self.session, id, self.inbox, &mut self.delay).await {
            Some(w) => w.and_then(|p| ProjectId::parse(&p)),
            None => return ProjectEvent::SessionEnded,
        };
        let new = match parsed {
            Ok(p) => p,
            Err(e) => {
                warn!("Project-Number write rejected: {:?}", e);
                self.session
                    .request_teardown(id, TeardownReason::ProtocolError(ChannelId::ProjectNumber));
                return ProjectEvent::Rejected(e);
            }
        };

        let changed = self.project.get() != new;
        if changed {
            self.project.set(new.clone());
        }
        // Compared against the store, not the cell: a failed save is retried.
        if self.persisted.as_ref() != Some(&new) {
            match self.store.save(&new).await {
                Ok(()) => {
                    info!("project number now {}", new.as_str());
                    self.persisted = Some(new.clone());
                }
                Err(e) => error!("failed to persist project number: {:?}", e),
            }
        }

        set_or_log(self.outbound, ChannelId::ProjectNumber, new.as_bytes());
        let confirm = compose(PROJECT_CONFIRM_PREFIX, new.as_str());
        notify_or_log(self.outbound, ChannelId::UartTx, confirm.as_bytes());

        if changed {
            ProjectEvent::Updated(new)
        } else {
            ProjectEvent::Unchanged(new)
        }
    }
}
