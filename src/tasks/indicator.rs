//! Status LED: slow blink while a peer is connected, fast otherwise.

use crate::config::{BLINK_CONNECTED_MS, BLINK_IDLE_MS};
use crate::session::SessionState;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_hal_async::delay::DelayNs;

pub struct Indicator<'a, P, D> {
    session: &'a SessionState,
    led: P,
    delay: D,
    lit: bool,
}

impl<'a, P: OutputPin, D: DelayNs> Indicator<'a, P, D> {
    pub fn new(session: &'a SessionState, led: P, delay: D) -> Self {
        Self {
            session,
            led,
            delay,
            lit: true,
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    /// Drive the LED, flip the next level, and sleep. Returns the period used.
    pub async fn run_once(&mut self) -> u32 {
        if self.led.set_state(PinState::from(self.lit)).is_err() {
            warn!("LED pin error");
        }
        self.lit = !self.lit;

        let period = if self.session.is_connected() {
            BLINK_CONNECTED_MS
        } else {
            BLINK_IDLE_MS
        };
        self.delay.delay_ms(period).await;
        period
    }
}
