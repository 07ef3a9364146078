//! Long-running tasks that consume the session.
//!
//! Each task is a struct holding its collaborators, with a `run_once`
//! step that returns what happened (for tests and logging) and a `run`
//! loop that never returns. Between suspension points every task
//! re-checks the session; none caches "connected" across an `.await`.

pub mod battery;
pub mod indicator;
pub mod liveness;
pub mod project;
pub mod relay;

use crate::ble::channel::{WriteInbox, WriteResult};
use crate::session::{SessionId, SessionState};
use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;

/// Wait for the next write on `inbox`, or give up once `id` ends.
///
/// Returns `None` if the session ended first, or if the write only
/// completed after the session was gone.
pub(crate) async fn next_write<D: DelayNs>(
    session: &SessionState,
    id: SessionId,
    inbox: &WriteInbox,
    delay: &mut D,
) -> Option<WriteResult> {
    match select(inbox.written(), session.wait_ended(id, delay)).await {
        Either::First(w) if session.is_current(id) => Some(w),
        Either::First(_) => {
            debug!("{:?} write arrived after session end", inbox.channel());
            None
        }
        Either::Second(()) => None,
    }
}
