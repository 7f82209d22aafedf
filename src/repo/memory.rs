use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{MetricStore, StoreError};
use crate::domain::{BucketTotal, MetricPoint, TotalKind};

const DEFAULT_RETENTION_DAYS: u32 = 90;

#[derive(Default)]
struct PointLog {
    points: VecDeque<MetricPoint>,
    ids: HashSet<String>,
}

/// In-process store used for simulation runs and tests.
///
/// Points older than the retention period (measured from the newest point)
/// are dropped on insert; totals are kept.
pub struct MemoryStore {
    retention: Duration,
    log: RwLock<PointLog>,
    totals: RwLock<HashMap<(TotalKind, i32), BucketTotal>>,
    calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION_DAYS)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(days: u32) -> Self {
        Self {
            retention: Duration::days(i64::from(days.max(1))),
            log: RwLock::new(PointLog::default()),
            totals: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn points(&self) -> Vec<MetricPoint> {
        self.log.read().await.points.iter().cloned().collect()
    }

    pub async fn total(&self, kind: TotalKind, bucket: i32) -> Option<BucketTotal> {
        self.totals.read().await.get(&(kind, bucket)).cloned()
    }

    /// Number of store operations of any kind served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn insert_point(&self, point: &MetricPoint) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut log = self.log.write().await;
        if !log.ids.insert(point.id.clone()) {
            return Err(StoreError::Rejected(format!("duplicate point id {}", point.id)));
        }
        log.points.push_back(point.clone());

        let cutoff = point.point_date_time - self.retention;
        while log.points.front().is_some_and(|p| p.point_date_time < cutoff) {
            if let Some(expired) = log.points.pop_front() {
                log.ids.remove(&expired.id);
            }
        }
        Ok(())
    }

    async fn upsert_total(&self, total: &BucketTotal) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.totals
            .write()
            .await
            .insert((total.id, total.total_bucket), total.clone());
        Ok(())
    }

    async fn query_total(&self, kind: TotalKind, bucket: i32) -> Result<Option<BucketTotal>, StoreError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.total(kind, bucket).await)
    }
}
