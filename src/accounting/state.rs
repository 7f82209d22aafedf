use chrono::{DateTime, FixedOffset};
use tracing::info;

use super::BucketAccumulator;
use crate::domain::{day_key, year_key, Sample, TotalKind};
use crate::metering::AnomalyDetector;
use crate::repo::{MetricStore, StoreError};

/// Everything the monitor carries from one tick to the next.
///
/// Owned by the scheduler and handed to each tick by `&mut`, so there is
/// never more than one writer.
#[derive(Debug, Clone)]
pub struct RunningState {
    /// Last sample whose power exceeded the negligible threshold
    pub previous: Option<Sample>,
    pub buckets: BucketAccumulator,
    pub detector: AnomalyDetector,
}

impl RunningState {
    pub fn new(now: &DateTime<FixedOffset>, duplicate_threshold: u32) -> Self {
        Self {
            previous: None,
            buckets: BucketAccumulator::new(now),
            detector: AnomalyDetector::new(duplicate_threshold),
        }
    }

    /// Cold-start: continue from the totals already persisted for today and this year.
    pub async fn recover(
        store: &dyn MetricStore,
        now: &DateTime<FixedOffset>,
        duplicate_threshold: u32,
    ) -> Result<Self, StoreError> {
        let day = store.query_total(TotalKind::Day, day_key(now)).await?;
        let year = store.query_total(TotalKind::Year, year_key(now)).await?;

        let buckets = BucketAccumulator::restore(now, day.as_ref(), year.as_ref())
            .map_err(|e| StoreError::Corrupt(format!("stored total is not a number: {e}")))?;

        info!(
            day_bucket = buckets.day_key(),
            day_kwh = buckets.day_kwh(),
            year_bucket = buckets.year_key(),
            year_kwh = buckets.year_kwh(),
            "recovered running totals"
        );

        Ok(Self {
            previous: None,
            buckets,
            detector: AnomalyDetector::new(duplicate_threshold),
        })
    }
}
