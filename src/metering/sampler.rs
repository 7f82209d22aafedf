use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use tracing::warn;

use super::{Calibration, SignalSmoother};
use crate::domain::{Channel, Sample};
use crate::hardware::{SensorError, SensorSource};

/// Result of one sampling pass.
#[derive(Debug)]
pub struct Reading {
    pub sample: Sample,
    /// Channels that could not be read and were counted as zero
    pub failures: Vec<SensorError>,
}

enum Mode {
    Metered,
    Raw {
        voltage: SignalSmoother,
        current: SignalSmoother,
        calibration: Calibration,
    },
}

/// Produces one [`Sample`] per tick from a [`SensorSource`].
///
/// A channel that fails to read counts as zero for the tick so the loop
/// keeps running on a flaky network.
pub struct PowerSampler {
    source: Arc<dyn SensorSource>,
    mode: Mode,
    min_voltage: f64,
}

impl PowerSampler {
    /// Power is read directly; voltage and current are informational.
    pub fn metered(source: Arc<dyn SensorSource>, min_voltage: f64) -> Self {
        Self {
            source,
            mode: Mode::Metered,
            min_voltage,
        }
    }

    /// Raw counts are smoothed over `window` readings and calibrated; power is `V * I`.
    pub fn raw(
        source: Arc<dyn SensorSource>,
        window: usize,
        calibration: Calibration,
        min_voltage: f64,
    ) -> anyhow::Result<Self> {
        let voltage = SignalSmoother::new(window)
            .ok_or_else(|| anyhow::anyhow!("smoothing window must be at least 1"))?;
        let current = voltage.clone();
        Ok(Self {
            source,
            mode: Mode::Raw {
                voltage,
                current,
                calibration,
            },
            min_voltage,
        })
    }

    pub async fn sample(&mut self, now: DateTime<FixedOffset>) -> Reading {
        let mut failures = Vec::new();

        let sample = match &mut self.mode {
            Mode::Metered => {
                let source = self.source.as_ref();
                let voltage = read_channel(source, Channel::Voltage, &mut failures).await.unwrap_or(0.0);
                let current = read_channel(source, Channel::Current, &mut failures).await.unwrap_or(0.0);
                let power = read_channel(source, Channel::Power, &mut failures).await.unwrap_or(0.0);
                let (voltage, current) = clamp(voltage, current, self.min_voltage);
                Sample::new(now, voltage, current, power)
            }
            Mode::Raw {
                voltage,
                current,
                calibration,
            } => {
                // a failed read is zero for this tick only and never enters the window
                let raw_v = read_channel(self.source.as_ref(), Channel::RawVoltage, &mut failures).await;
                let raw_a = read_channel(self.source.as_ref(), Channel::RawCurrent, &mut failures).await;
                let volts = raw_v
                    .and_then(|raw| voltage.push(raw))
                    .map(|avg| calibration.volts(avg))
                    .unwrap_or(0.0);
                let amps = raw_a
                    .and_then(|raw| current.push(raw))
                    .map(|avg| calibration.amps(avg))
                    .unwrap_or(0.0);
                let (volts, amps) = clamp(volts, amps, self.min_voltage);
                Sample::new(now, volts, amps, volts * amps)
            }
        };

        Reading { sample, failures }
    }
}

/// Near-zero leakage voltage is treated as true zero.
fn clamp(voltage: f64, current: f64, min_voltage: f64) -> (f64, f64) {
    if voltage < min_voltage {
        (0.0, 0.0)
    } else {
        (voltage, current)
    }
}

/// `None` when the channel could not be read; the error is recorded in `failures`.
async fn read_channel(
    source: &dyn SensorSource,
    channel: Channel,
    failures: &mut Vec<SensorError>,
) -> Option<f64> {
    match source.read(channel).await {
        Ok(value) if value.is_finite() => Some(value),
        Ok(value) => {
            warn!(%channel, value, "non-finite sensor value, using 0");
            failures.push(SensorError::Parse {
                channel,
                message: format!("non-finite value {value}"),
            });
            None
        }
        Err(e) => {
            warn!(%channel, error = %e, "sensor read failed, using 0");
            failures.push(e);
            None
        }
    }
}
