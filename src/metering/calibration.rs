//! Raw ADC count to engineering unit conversion.
//!
//! Voltage comes from a resistor divider in front of the ADC; current from a
//! hall-effect sensor centred on a zero offset. Both are pure formulas over
//! configured constants.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Calibration {
    /// Full-scale ADC count
    pub adc_max: f64,
    /// Empirical correction subtracted from `adc_max` for the voltage channel
    pub adc_adjust: f64,
    /// ADC reference voltage (V)
    pub ref_volts: f64,
    /// Divider high-side resistor (ohm)
    pub r1_ohms: f64,
    /// Divider low-side resistor (ohm)
    pub r2_ohms: f64,
    /// Supply seen by the current sensor (mV)
    pub supply_mv: f64,
    /// Sensor output at zero current (mV)
    pub zero_offset_mv: f64,
    /// Sensor sensitivity (mV per A)
    pub mv_per_amp: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            adc_max: 1023.0,
            adc_adjust: 30.0,
            ref_volts: 5.0,
            r1_ohms: 330_000.0,
            r2_ohms: 10_000.0,
            supply_mv: 5006.0,
            zero_offset_mv: 2500.0,
            mv_per_amp: 15.5,
        }
    }
}

impl Calibration {
    fn divider_ratio(&self) -> f64 {
        self.r2_ohms / (self.r1_ohms + self.r2_ohms)
    }

    /// Highest voltage the divider can present to the ADC.
    pub fn max_volts(&self) -> f64 {
        self.ref_volts / self.divider_ratio()
    }

    pub fn volts(&self, avg_counts: f64) -> f64 {
        ((avg_counts / (self.adc_max - self.adc_adjust)) * self.ref_volts) / self.divider_ratio()
    }

    pub fn amps(&self, avg_counts: f64) -> f64 {
        let millivolts = (avg_counts / self.adc_max) * self.supply_mv;
        (millivolts - self.zero_offset_mv) / self.mv_per_amp
    }
}
