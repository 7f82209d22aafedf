//! Persisted record shapes.
//!
//! Bucket keys are derived from the local wall clock while the stored
//! timestamps are UTC. The two are kept as separate fields on purpose: a
//! reading taken at 20:30 local time on the 9th may carry a UTC timestamp on
//! the 10th but still belongs to the 9th's DAY bucket.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::num::ParseFloatError;
use strum::{Display, EnumString};
use uuid::Uuid;

use super::Sample;

/// Number of decimals used for every persisted numeric string.
pub const FIXED_DECIMALS: usize = 3;

/// Format a value the way it is stored, e.g. `1.5` -> `"1.500"`.
pub fn fixed(value: f64) -> String {
    format!("{:.*}", FIXED_DECIMALS, value)
}

pub fn parse_fixed(value: &str) -> Result<f64, ParseFloatError> {
    value.trim().parse::<f64>()
}

/// `yyyyMMdd` of the local date.
pub fn day_key<Tz: TimeZone>(t: &DateTime<Tz>) -> i32 {
    t.year() * 10_000 + t.month() as i32 * 100 + t.day() as i32
}

/// `yyyyMM` of the local date.
pub fn year_month_key<Tz: TimeZone>(t: &DateTime<Tz>) -> i32 {
    t.year() * 100 + t.month() as i32
}

/// `yyyy` of the local date.
pub fn year_key<Tz: TimeZone>(t: &DateTime<Tz>) -> i32 {
    t.year()
}

/// `yyHHmmss`: two-digit year followed by the local time of day.
pub fn day_time_key<Tz: TimeZone>(t: &DateTime<Tz>) -> i64 {
    (t.year().rem_euclid(100) as i64) * 1_000_000
        + t.hour() as i64 * 10_000
        + t.minute() as i64 * 100
        + t.second() as i64
}

/// Append-only time-series point, partitioned by `PointDay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricPoint {
    #[serde(rename = "id")]
    pub id: String,
    pub point_day: i32,
    pub point_date_time: DateTime<Utc>,
    pub point_year_month: i32,
    pub point_day_time: i64,
    #[serde(rename = "pvVolts")]
    pub pv_volts: String,
    #[serde(rename = "pvAmps")]
    pub pv_amps: String,
    #[serde(rename = "pvWatts")]
    pub pv_watts: String,
}

impl MetricPoint {
    pub fn from_sample(sample: &Sample) -> Self {
        let ts = &sample.timestamp;
        Self {
            id: Uuid::new_v4().to_string(),
            point_day: day_key(ts),
            point_date_time: ts.with_timezone(&Utc),
            point_year_month: year_month_key(ts),
            point_day_time: day_time_key(ts),
            pv_volts: fixed(sample.voltage),
            pv_amps: fixed(sample.current),
            pv_watts: fixed(sample.power),
        }
    }
}

/// Kind of cumulative bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TotalKind {
    Day,
    Year,
}

/// Cumulative energy record, replaced by `(id, TotalBucket)` on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketTotal {
    #[serde(rename = "id")]
    pub id: TotalKind,
    pub total_bucket: i32,
    pub last_update_date_time: DateTime<Utc>,
    pub total_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_current: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_power: Option<String>,
}

impl BucketTotal {
    pub fn day(
        bucket: i32,
        updated_at: DateTime<Utc>,
        kwh: f64,
        peak_current: f64,
        peak_power: f64,
    ) -> Self {
        Self {
            id: TotalKind::Day,
            total_bucket: bucket,
            last_update_date_time: updated_at,
            total_value: fixed(kwh),
            peak_current: Some(fixed(peak_current)),
            peak_power: Some(fixed(peak_power)),
        }
    }

    pub fn year(bucket: i32, updated_at: DateTime<Utc>, kwh: f64) -> Self {
        Self {
            id: TotalKind::Year,
            total_bucket: bucket,
            last_update_date_time: updated_at,
            total_value: fixed(kwh),
            peak_current: None,
            peak_power: None,
        }
    }

    pub fn value_kwh(&self) -> Result<f64, ParseFloatError> {
        parse_fixed(&self.total_value)
    }

    /// Parsed `(peak_current, peak_power)`; absent peaks read as zero.
    pub fn peaks(&self) -> Result<(f64, f64), ParseFloatError> {
        let current = self.peak_current.as_deref().map(parse_fixed).transpose()?;
        let power = self.peak_power.as_deref().map(parse_fixed).transpose()?;
        Ok((current.unwrap_or(0.0), power.unwrap_or(0.0)))
    }
}
