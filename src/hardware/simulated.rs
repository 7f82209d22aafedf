//! # Simulated PV Array
//!
//! Stands in for a smart plug during development. Production follows a
//! half-sine between sunrise and sunset with multiplicative noise; the raw
//! channels are produced by running the same numbers backwards through the
//! calibration so the smoothing path can be exercised as well.

use async_trait::async_trait;
use chrono::{Local, Timelike, Utc};
use chrono_tz::Tz;
use rand::Rng;
use std::f64::consts::PI;
use std::sync::Mutex;

use super::{SensorError, SensorSource};
use crate::domain::Channel;
use crate::metering::Calibration;

#[derive(Debug, Clone)]
pub struct SolarProfile {
    /// Array output at solar noon under clear sky (W)
    pub peak_w: f64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    /// Nominal grid-tie voltage (V)
    pub nominal_volts: f64,
    /// Relative noise amplitude (0.05 = +/-5%)
    pub noise: f64,
}

impl Default for SolarProfile {
    fn default() -> Self {
        Self {
            peak_w: 1_800.0,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            nominal_volts: 121.0,
            noise: 0.05,
        }
    }
}

impl SolarProfile {
    /// Clear-sky output at a fractional local hour.
    pub fn clear_sky_w(&self, hour: f64) -> f64 {
        if hour <= self.sunrise_hour || hour >= self.sunset_hour {
            return 0.0;
        }
        let day_fraction = (hour - self.sunrise_hour) / (self.sunset_hour - self.sunrise_hour);
        self.peak_w * (PI * day_fraction).sin()
    }
}

pub struct SimulatedSolarSource {
    profile: SolarProfile,
    calibration: Calibration,
    zone: Option<Tz>,
    rng: Mutex<rand::rngs::StdRng>,
}

impl SimulatedSolarSource {
    pub fn new(profile: SolarProfile, calibration: Calibration) -> Self {
        use rand::SeedableRng;
        Self {
            profile,
            calibration,
            zone: None,
            rng: Mutex::new(rand::rngs::StdRng::from_entropy()),
        }
    }

    /// Follow the sun in `zone` instead of the system local zone.
    pub fn in_zone(mut self, zone: Option<Tz>) -> Self {
        self.zone = zone;
        self
    }

    fn local_hour(&self) -> f64 {
        let (hour, minute) = match self.zone {
            Some(tz) => {
                let now = Utc::now().with_timezone(&tz);
                (now.hour(), now.minute())
            }
            None => {
                let now = Local::now();
                (now.hour(), now.minute())
            }
        };
        hour as f64 + minute as f64 / 60.0
    }

    fn jitter(&self) -> f64 {
        let noise = self.profile.noise.abs();
        if noise == 0.0 {
            return 1.0;
        }
        match self.rng.lock() {
            Ok(mut rng) => 1.0 + rng.gen_range(-noise..=noise),
            Err(_) => 1.0,
        }
    }

    fn reading_at(&self, hour: f64) -> (f64, f64, f64) {
        let power = self.profile.clear_sky_w(hour) * self.jitter();
        let voltage = self.profile.nominal_volts * (1.0 + (self.jitter() - 1.0) * 0.1);
        let current = if voltage > 0.0 { power / voltage } else { 0.0 };
        (voltage, current, power)
    }

    fn channel_value(&self, channel: Channel, (voltage, current, power): (f64, f64, f64)) -> f64 {
        let cal = &self.calibration;
        match channel {
            Channel::Voltage => voltage,
            Channel::Current => current,
            Channel::Power => power,
            Channel::RawVoltage => {
                let ratio = cal.r2_ohms / (cal.r1_ohms + cal.r2_ohms);
                (voltage * ratio / cal.ref_volts) * (cal.adc_max - cal.adc_adjust)
            }
            Channel::RawCurrent => {
                let millivolts = current * cal.mv_per_amp + cal.zero_offset_mv;
                millivolts / cal.supply_mv * cal.adc_max
            }
        }
    }
}

#[async_trait]
impl SensorSource for SimulatedSolarSource {
    async fn read(&self, channel: Channel) -> Result<f64, SensorError> {
        Ok(self.channel_value(channel, self.reading_at(self.local_hour())))
    }
}
