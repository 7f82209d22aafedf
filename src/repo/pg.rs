#![cfg(feature = "db")]
//! PostgreSQL metric store.
//!
//! Points go to `metric_point`, partitioned logically by `point_day`.
//! Totals live in `metric_total` with `(id, total_bucket)` as primary key so an
//! upsert replaces the previous value for the bucket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use super::{MetricStore, StoreError};
use crate::domain::{BucketTotal, MetricPoint, TotalKind};

const SCHEMA: &str = include_str!("../../migrations/0001_metrics.sql");

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        // invalid_authorization_specification / invalid_password
        sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("28000") | Some("28P01")) => {
            StoreError::Unauthorized(db.message().to_string())
        }
        sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => StoreError::Corrupt(e.to_string()),
        _ => StoreError::Unavailable(e.to_string()),
    }
}

type TotalRow = (String, i32, DateTime<Utc>, String, Option<String>, Option<String>);

#[async_trait]
impl MetricStore for PgStore {
    async fn insert_point(&self, point: &MetricPoint) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO metric_point
                (id, point_day, point_date_time, point_year_month, point_day_time, pv_volts, pv_amps, pv_watts)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&point.id)
        .bind(point.point_day)
        .bind(point.point_date_time)
        .bind(point.point_year_month)
        .bind(point.point_day_time)
        .bind(&point.pv_volts)
        .bind(&point.pv_amps)
        .bind(&point.pv_watts)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn upsert_total(&self, total: &BucketTotal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO metric_total
                (id, total_bucket, last_update_date_time, total_value, peak_current, peak_power)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id, total_bucket) DO UPDATE SET
                last_update_date_time = EXCLUDED.last_update_date_time,
                total_value = EXCLUDED.total_value,
                peak_current = EXCLUDED.peak_current,
                peak_power = EXCLUDED.peak_power
            "#,
        )
        .bind(total.id.to_string())
        .bind(total.total_bucket)
        .bind(total.last_update_date_time)
        .bind(&total.total_value)
        .bind(&total.peak_current)
        .bind(&total.peak_power)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn query_total(&self, kind: TotalKind, bucket: i32) -> Result<Option<BucketTotal>, StoreError> {
        let row: Option<TotalRow> = sqlx::query_as(
            r#"
            SELECT id, total_bucket, last_update_date_time, total_value, peak_current, peak_power
            FROM metric_total
            WHERE id = $1 AND total_bucket = $2
            "#,
        )
        .bind(kind.to_string())
        .bind(bucket)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(|(id, total_bucket, last_update_date_time, total_value, peak_current, peak_power)| {
            let id = id
                .parse::<TotalKind>()
                .map_err(|_| StoreError::Corrupt(format!("unknown total id {id:?}")))?;
            Ok(BucketTotal {
                id,
                total_bucket,
                last_update_date_time,
                total_value,
                peak_current,
                peak_power,
            })
        })
        .transpose()
    }
}
