//! Periodic battery report.

use crate::battery::BatteryReading;
use crate::ble::channel::{notify_or_log, set_or_log, ChannelId, Outbound};
use crate::config::BATTERY_INTERVAL_MS;
use crate::session::SessionState;
use embedded_hal_async::delay::DelayNs;

/// Battery sense hardware.
#[allow(async_fn_in_trait)]
pub trait BatterySensor {
    /// One raw ADC sample of the divided battery voltage.
    async fn sample(&mut self) -> i16;

    /// Whether USB power is present. Diagnostic only.
    fn usb_powered(&mut self) -> bool;
}

pub struct BatteryReporter<'a, S, O, D> {
    session: &'a SessionState,
    sensor: S,
    outbound: &'a O,
    delay: D,
}

impl<'a, S, O, D> BatteryReporter<'a, S, O, D>
where
    S: BatterySensor,
    O: Outbound,
    D: DelayNs,
{
    pub fn new(session: &'a SessionState, sensor: S, outbound: &'a O, delay: D) -> Self {
        Self {
            session,
            sensor,
            outbound,
            delay,
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    /// Sample, publish, then sleep one interval.
    pub async fn run_once(&mut self) -> BatteryReading {
        let reading = BatteryReading::from_raw(self.sensor.sample().await);
        let level = reading.encode();

        set_or_log(self.outbound, ChannelId::Battery, &level);
        if self.session.is_connected() {
            notify_or_log(self.outbound, ChannelId::Battery, &level);
        }

        if self.sensor.usb_powered() {
            info!("Charging!");
        } else {
            debug!("Voltage {} V ({} %)", reading.voltage, reading.percentage);
        }

        self.delay.delay_ms(BATTERY_INTERVAL_MS).await;
        reading
    }
}
