use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sensor channel read from a [`crate::hardware::SensorSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Metered RMS voltage (V)
    Voltage,
    /// Metered current (A)
    Current,
    /// Metered active power (W)
    Power,
    /// Raw ADC counts from the voltage divider
    RawVoltage,
    /// Raw ADC counts from the hall-effect current sensor
    RawCurrent,
}

/// One reading taken during a tick. Transient, never persisted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Local wall-clock time of the reading
    pub timestamp: DateTime<FixedOffset>,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<FixedOffset>, voltage: f64, current: f64, power: f64) -> Self {
        Self {
            timestamp,
            voltage,
            current,
            power,
        }
    }

    /// Power at or below `threshold_w` is idle noise, not production.
    pub fn is_negligible(&self, threshold_w: f64) -> bool {
        self.power <= threshold_w
    }
}
