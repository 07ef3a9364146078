//! Battery voltage → percentage conversion.

use crate::config::{ADC_VOLTS_PER_COUNT, BATTERY_EMPTY_VOLTS, BATTERY_FULL_VOLTS};

/// Linear state of charge between the empty and full references,
/// clamped to `[0, 100]`.
pub fn percentage(voltage: f32) -> f32 {
    let pct = 100.0 * (voltage - BATTERY_EMPTY_VOLTS) / (BATTERY_FULL_VOLTS - BATTERY_EMPTY_VOLTS);
    pct.clamp(0.0, 100.0)
}

/// One sample. Nothing is kept between samples.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    pub voltage: f32,
    pub percentage: f32,
}

impl BatteryReading {
    pub fn from_voltage(voltage: f32) -> Self {
        Self {
            voltage,
            percentage: percentage(voltage),
        }
    }

    /// From a raw SAADC count. Negative counts (input slightly below
    /// ground) read as zero volts.
    pub fn from_raw(raw: i16) -> Self {
        let counts = raw.max(0) as f32;
        Self::from_voltage(counts * ADC_VOLTS_PER_COUNT)
    }

    /// Battery Level characteristic payload: percentage truncated to
    /// `i16`, little-endian.
    pub fn encode(&self) -> [u8; 2] {
        (self.percentage as i16).to_le_bytes()
    }
}
