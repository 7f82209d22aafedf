pub mod gate;
pub mod scheduler;

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::accounting::{energy_delta_kwh, Rollover, RunningState};
use crate::config::MonitorConfig;
use crate::domain::{MetricPoint, Sample};
use crate::emoncms::EmoncmsForwarder;
use crate::metering::{PowerSampler, StuckSensor};
use crate::repo::{MetricStore, StoreError};

pub use gate::AdmissionWindow;
pub use scheduler::{Clock, Scheduler, SystemClock};

/// Per-tick knobs taken from `[monitor]`.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub window: AdmissionWindow,
    pub negligible_power_w: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            window: AdmissionWindow::default(),
            negligible_power_w: 0.001,
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            window: AdmissionWindow::from(cfg),
            negligible_power_w: cfg.negligible_power_w,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Outside the admission window; nothing was read or written
    Idle,
    /// Power at or below the negligible threshold
    Negligible,
    /// Point written; `delta_kwh` is set when the totals moved
    Accepted { delta_kwh: Option<f64> },
}

/// What a single tick did.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub rollover: Rollover,
    pub outcome: TickOutcome,
    pub sample: Option<Sample>,
    pub stuck_sensor: Option<StuckSensor>,
    /// Readings are still frozen, signalled or not
    pub sensor_stuck: bool,
    /// Channels that failed to read and were counted as zero
    pub read_failures: usize,
}

impl TickReport {
    fn idle(rollover: Rollover) -> Self {
        Self {
            rollover,
            outcome: TickOutcome::Idle,
            sample: None,
            stuck_sensor: None,
            sensor_stuck: false,
            read_failures: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    /// One or more store writes failed. In-memory state has already advanced.
    #[error("{} store write(s) failed", .errors.len())]
    Persistence {
        report: TickReport,
        errors: Vec<StoreError>,
    },
    #[error("Fatal store error: {0}")]
    Fatal(StoreError),
}

impl CycleError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Fatal(_))
    }
}

/// Runs one sample/integrate/persist cycle at a time against a [`RunningState`].
pub struct MonitorEngine {
    sampler: PowerSampler,
    store: Arc<dyn MetricStore>,
    forwarder: Option<EmoncmsForwarder>,
    settings: MonitorSettings,
}

impl MonitorEngine {
    pub fn new(sampler: PowerSampler, store: Arc<dyn MetricStore>, settings: MonitorSettings) -> Self {
        Self {
            sampler,
            store,
            forwarder: None,
            settings,
        }
    }

    pub fn with_forwarder(mut self, forwarder: EmoncmsForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub async fn tick(
        &mut self,
        state: &mut RunningState,
        now: DateTime<FixedOffset>,
    ) -> Result<TickReport, CycleError> {
        let day_before = state.buckets.day_key();
        let rollover = state.buckets.roll_over(&now, self.settings.window.start_hour());
        if state.buckets.day_key() != day_before {
            // never integrate across a date change
            state.previous = None;
        }
        if rollover.any() {
            info!(
                day_reset = rollover.day,
                year_reset = rollover.year,
                day_bucket = state.buckets.day_key(),
                year_bucket = state.buckets.year_key(),
                "bucket rollover"
            );
        }

        if !self.settings.window.admits(&now) {
            debug!(hour = %now.format("%H"), "outside admission window");
            return Ok(TickReport::idle(rollover));
        }

        let reading = self.sampler.sample(now).await;
        let sample = reading.sample;
        let mut report = TickReport {
            rollover,
            outcome: TickOutcome::Negligible,
            sample: Some(sample),
            stuck_sensor: None,
            sensor_stuck: false,
            read_failures: reading.failures.len(),
        };

        report.stuck_sensor = state.detector.observe(&sample);
        report.sensor_stuck = state.detector.is_stuck();
        if let Some(stuck) = &report.stuck_sensor {
            warn!(
                repeats = stuck.repeats,
                voltage = stuck.voltage,
                current = stuck.current,
                "sensor readings have stopped changing"
            );
        }

        // emoncms gets every admitted reading so idle periods show as zeros
        if let Some(forwarder) = &self.forwarder {
            if let Err(e) = forwarder.forward(&sample).await {
                warn!(error = %e, "emoncms forward failed");
            }
        }

        if sample.is_negligible(self.settings.negligible_power_w) {
            debug!(power_w = sample.power, "negligible power, skipping");
            return Ok(report);
        }

        let mut errors = Vec::new();
        if let Err(e) = self.store.insert_point(&MetricPoint::from_sample(&sample)).await {
            errors.push(e);
        }

        let delta = energy_delta_kwh(state.previous.as_ref(), &sample);
        if let Some(delta) = delta {
            state.buckets.apply(delta, &sample);
            let updated_at = now.with_timezone(&Utc);
            for total in [
                state.buckets.day_total(updated_at),
                state.buckets.year_total(updated_at),
            ] {
                if let Err(e) = self.store.upsert_total(&total).await {
                    errors.push(e);
                }
            }
        }
        state.previous = Some(sample);
        report.outcome = TickOutcome::Accepted { delta_kwh: delta };

        info!(
            voltage = sample.voltage,
            current = sample.current,
            power_w = sample.power,
            delta_kwh = delta.unwrap_or(0.0),
            day_kwh = state.buckets.day_kwh(),
            year_kwh = state.buckets.year_kwh(),
            "sample accepted"
        );

        if let Some(pos) = errors.iter().position(StoreError::is_fatal) {
            return Err(CycleError::Fatal(errors.swap_remove(pos)));
        }
        if !errors.is_empty() {
            return Err(CycleError::Persistence { report, errors });
        }
        Ok(report)
    }
}
