//! Ebyte E32 LoRa module in transparent mode.
//!
//! The module is driven over a UART plus three GPIOs:
//!
//! | Pin | Dir | Meaning                                  |
//! |-----|-----|------------------------------------------|
//! | M0  | out | mode select, bit 0                       |
//! | M1  | out | mode select, bit 1                       |
//! | AUX | in  | high when the module is idle and ready   |
//!
//! Only the normal (transparent) mode is used for traffic: bytes written to
//! the UART are broadcast as-is on the configured channel.

use crate::config::{E32_AUX_TIMEOUT_MS, E32_MAX_PACKET, E32_MODE_SETTLE_MS};
use crate::radio::{Radio, ResponseStatus};
use embassy_futures::select::{select, Either};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_io_async::Write;

/// Operating mode, selected by the M0/M1 levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// M0=0 M1=0: transparent transmit and receive.
    Normal,
    /// M0=1 M1=0: transmit with wake-up preamble.
    WakeUp,
    /// M0=0 M1=1: receive only, woken by preamble.
    PowerSaving,
    /// M0=1 M1=1: configuration / sleep.
    Sleep,
}

impl Mode {
    /// `(m0, m1)` levels.
    pub const fn pins(self) -> (bool, bool) {
        match self {
            Mode::Normal => (false, false),
            Mode::WakeUp => (true, false),
            Mode::PowerSaving => (false, true),
            Mode::Sleep => (true, true),
        }
    }
}

pub struct E32<U, M0, M1, A, D> {
    uart: U,
    m0: M0,
    m1: M1,
    aux: A,
    delay: D,
    mode: Option<Mode>,
}

impl<U, M0, M1, A, D> E32<U, M0, M1, A, D>
where
    U: Write,
    M0: OutputPin,
    M1: OutputPin,
    A: Wait,
    D: DelayNs,
{
    pub fn new(uart: U, m0: M0, m1: M1, aux: A, delay: D) -> Self {
        Self {
            uart,
            m0,
            m1,
            aux,
            delay,
            mode: None,
        }
    }

    /// Put the module in normal mode and wait until it reports ready.
    pub async fn begin(&mut self) -> ResponseStatus {
        match self.set_mode(Mode::Normal).await {
            Ok(()) => self.wait_aux().await,
            Err(status) => status,
        }
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub async fn set_mode(&mut self, mode: Mode) -> Result<(), ResponseStatus> {
        let (m0, m1) = mode.pins();
        self.m0
            .set_state(m0.into())
            .map_err(|_| ResponseStatus::Hardware)?;
        self.m1
            .set_state(m1.into())
            .map_err(|_| ResponseStatus::Hardware)?;
        self.delay.delay_ms(E32_MODE_SETTLE_MS).await;
        self.mode = Some(mode);
        debug!("E32 mode {:?}", mode);
        Ok(())
    }

    /// Wait for AUX high, bounded by [`E32_AUX_TIMEOUT_MS`].
    async fn wait_aux(&mut self) -> ResponseStatus {
        match select(
            self.aux.wait_for_high(),
            self.delay.delay_ms(E32_AUX_TIMEOUT_MS),
        )
        .await
        {
            Either::First(Ok(())) => ResponseStatus::Success,
            Either::First(Err(_)) => ResponseStatus::Hardware,
            Either::Second(()) => ResponseStatus::Timeout,
        }
    }
}

impl<U, M0, M1, A, D> Radio for E32<U, M0, M1, A, D>
where
    U: Write,
    M0: OutputPin,
    M1: OutputPin,
    A: Wait,
    D: DelayNs,
{
    async fn send_transparent(&mut self, text: &str) -> ResponseStatus {
        if text.len() > E32_MAX_PACKET {
            return ResponseStatus::PacketTooBig;
        }
        if self.mode != Some(Mode::Normal) {
            return ResponseStatus::NotInitial;
        }

        let ready = self.wait_aux().await;
        if !ready.is_success() {
            return ready;
        }
        if self.uart.write_all(text.as_bytes()).await.is_err() {
            return ResponseStatus::Hardware;
        }
        if self.uart.flush().await.is_err() {
            return ResponseStatus::Hardware;
        }
        debug!("E32 sent {} bytes", text.len());
        self.wait_aux().await
    }
}
