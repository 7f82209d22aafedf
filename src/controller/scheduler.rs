use chrono::{DateTime, FixedOffset, Local, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{CycleError, MonitorEngine, TickOutcome};
use crate::accounting::RunningState;

/// Source of local wall-clock time for bucket keys and the admission window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in a configured zone, or the system local zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    zone: Option<Tz>,
}

impl SystemClock {
    pub fn new(zone: Option<Tz>) -> Self {
        Self { zone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.zone {
            Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
            None => Local::now().fixed_offset(),
        }
    }
}

/// Tick bookkeeping
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub accepted_count: u64,
    pub idle_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

/// Drives [`MonitorEngine::tick`] on a fixed interval until cancelled.
pub struct Scheduler {
    engine: MonitorEngine,
    clock: Arc<dyn Clock>,
    period: Duration,
    stats: TickStats,
}

impl Scheduler {
    pub fn new(engine: MonitorEngine, clock: Arc<dyn Clock>, interval_seconds: u64) -> Self {
        Self {
            engine,
            clock,
            period: Duration::from_secs(interval_seconds.max(1)),
            stats: TickStats::default(),
        }
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Run until `cancel` fires or a fatal error occurs. Returns the final
    /// state on a clean stop. A tick in progress always completes.
    pub async fn run(
        &mut self,
        mut state: RunningState,
        cancel: CancellationToken,
    ) -> Result<RunningState, CycleError> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.period.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let now = self.clock.now();
            self.stats.last_run = Some(now.with_timezone(&Utc));
            self.stats.run_count += 1;

            match self.engine.tick(&mut state, now).await {
                Ok(report) => match report.outcome {
                    TickOutcome::Idle => self.stats.idle_count += 1,
                    TickOutcome::Accepted { .. } => self.stats.accepted_count += 1,
                    TickOutcome::Negligible => {}
                },
                Err(e) if e.is_fatal() => {
                    self.stats.error_count += 1;
                    self.stats.last_error = Some(e.to_string());
                    error!(error = %e, "fatal error, stopping scheduler");
                    return Err(e);
                }
                Err(e) => {
                    self.stats.error_count += 1;
                    self.stats.last_error = Some(e.to_string());
                    if let CycleError::Persistence { errors, .. } = &e {
                        for err in errors {
                            warn!(error = %err, "store write failed");
                        }
                    }
                }
            }
        }

        info!(
            ticks = self.stats.run_count,
            accepted = self.stats.accepted_count,
            idle = self.stats.idle_count,
            errors = self.stats.error_count,
            last_tick = ?self.stats.last_run,
            day_kwh = state.buckets.day_kwh(),
            year_kwh = state.buckets.year_kwh(),
            "scheduler stopped"
        );
        Ok(state)
    }
}
