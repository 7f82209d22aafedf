use serde::Serialize;

use crate::domain::Sample;

/// Raised when the same nonzero voltage/current pair keeps repeating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StuckSensor {
    /// Consecutive repeats of the reading after its first occurrence
    pub repeats: u32,
    pub voltage: f64,
    pub current: f64,
}

/// Detects a frozen sensor feed.
///
/// Only flags the condition; whether to resubscribe or restart is up to the
/// caller.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    threshold: u32,
    prev_voltage: f64,
    prev_current: f64,
    repeats: u32,
}

impl AnomalyDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            prev_voltage: 0.0,
            prev_current: 0.0,
            repeats: 0,
        }
    }

    /// Inspect a sample. Returns a signal on the reading that makes the
    /// repeat count reach the threshold, once per stuck episode.
    pub fn observe(&mut self, sample: &Sample) -> Option<StuckSensor> {
        let identical = sample.voltage == self.prev_voltage && sample.current == self.prev_current;

        if identical && sample.current > 0.0 {
            self.repeats = self.repeats.saturating_add(1);
        } else {
            self.repeats = 0;
        }
        self.prev_voltage = sample.voltage;
        self.prev_current = sample.current;

        (self.threshold > 0 && self.repeats == self.threshold).then_some(StuckSensor {
            repeats: self.repeats,
            voltage: sample.voltage,
            current: sample.current,
        })
    }

    pub fn is_stuck(&self) -> bool {
        self.threshold > 0 && self.repeats >= self.threshold
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }
}
