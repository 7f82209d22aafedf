//! DAY and YEAR cumulative energy buckets.
//!
//! Rollover runs on every tick, before sampling. While the local hour is
//! before the admission window the DAY bucket (with its peaks) is held at
//! zero, and on January 1st the YEAR bucket as well. Re-zeroing an empty
//! bucket changes nothing, so the check can run on every pre-window tick.
//! A change of the local date or year since the last tick also resets the
//! matching bucket, which covers a window opening at midnight and a process
//! that was down across the boundary.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use std::num::ParseFloatError;

use crate::domain::{day_key, year_key, BucketTotal, Sample};

/// Which buckets were zeroed by a rollover check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rollover {
    pub day: bool,
    pub year: bool,
}

impl Rollover {
    pub fn any(&self) -> bool {
        self.day || self.year
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketAccumulator {
    day_key: i32,
    year_key: i32,
    day_kwh: f64,
    year_kwh: f64,
    peak_current: f64,
    peak_power: f64,
}

impl BucketAccumulator {
    /// Empty buckets keyed to the local date of `now`.
    pub fn new(now: &DateTime<FixedOffset>) -> Self {
        Self {
            day_key: day_key(now),
            year_key: year_key(now),
            day_kwh: 0.0,
            year_kwh: 0.0,
            peak_current: 0.0,
            peak_power: 0.0,
        }
    }

    /// Rebuild from persisted totals for the current bucket keys.
    pub fn restore(
        now: &DateTime<FixedOffset>,
        day: Option<&BucketTotal>,
        year: Option<&BucketTotal>,
    ) -> Result<Self, ParseFloatError> {
        let mut acc = Self::new(now);
        if let Some(day) = day.filter(|t| t.total_bucket == acc.day_key) {
            acc.day_kwh = day.value_kwh()?;
            (acc.peak_current, acc.peak_power) = day.peaks()?;
        }
        if let Some(year) = year.filter(|t| t.total_bucket == acc.year_key) {
            acc.year_kwh = year.value_kwh()?;
        }
        Ok(acc)
    }

    pub fn roll_over(&mut self, now: &DateTime<FixedOffset>, window_start_hour: u32) -> Rollover {
        let mut rolled = Rollover::default();

        let year = year_key(now);
        if year != self.year_key {
            self.year_key = year;
            rolled.year |= self.clear_year();
        }
        let day = day_key(now);
        if day != self.day_key {
            self.day_key = day;
            rolled.day |= self.clear_day();
        }

        if now.hour() < window_start_hour {
            rolled.day |= self.clear_day();
            if now.month() == 1 && now.day() == 1 {
                rolled.year |= self.clear_year();
            }
        }
        rolled
    }

    /// Add an integrated delta and track the day's peaks.
    pub fn apply(&mut self, delta_kwh: f64, sample: &Sample) {
        let delta = delta_kwh.max(0.0);
        self.day_kwh += delta;
        self.year_kwh += delta;
        self.peak_current = self.peak_current.max(sample.current);
        self.peak_power = self.peak_power.max(sample.power);
    }

    fn clear_day(&mut self) -> bool {
        let changed = self.day_kwh != 0.0 || self.peak_current != 0.0 || self.peak_power != 0.0;
        self.day_kwh = 0.0;
        self.peak_current = 0.0;
        self.peak_power = 0.0;
        changed
    }

    fn clear_year(&mut self) -> bool {
        let changed = self.year_kwh != 0.0;
        self.year_kwh = 0.0;
        changed
    }

    pub fn day_total(&self, updated_at: DateTime<Utc>) -> BucketTotal {
        BucketTotal::day(
            self.day_key,
            updated_at,
            self.day_kwh,
            self.peak_current,
            self.peak_power,
        )
    }

    pub fn year_total(&self, updated_at: DateTime<Utc>) -> BucketTotal {
        BucketTotal::year(self.year_key, updated_at, self.year_kwh)
    }

    pub fn day_key(&self) -> i32 {
        self.day_key
    }

    pub fn year_key(&self) -> i32 {
        self.year_key
    }

    pub fn day_kwh(&self) -> f64 {
        self.day_kwh
    }

    pub fn year_kwh(&self) -> f64 {
        self.year_kwh
    }

    pub fn peak_current(&self) -> f64 {
        self.peak_current
    }

    pub fn peak_power(&self) -> f64 {
        self.peak_power
    }
}
