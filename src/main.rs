use anyhow::{Context, Result};
use open_energy_monitor::accounting::RunningState;
use open_energy_monitor::config::{Config, SensorMode, SourceKind};
use open_energy_monitor::controller::{Clock, MonitorEngine, MonitorSettings, Scheduler, SystemClock};
use open_energy_monitor::emoncms::EmoncmsForwarder;
use open_energy_monitor::hardware::{SensorSource, SmartPlugSource};
use open_energy_monitor::metering::PowerSampler;
use open_energy_monitor::{repo, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let clock = SystemClock::new(cfg.monitor.zone()?);

    let source = build_source(&cfg)?;
    let sampler = match cfg.sensor.mode {
        SensorMode::Metered => PowerSampler::metered(source, cfg.monitor.min_voltage),
        SensorMode::Raw => PowerSampler::raw(
            source,
            cfg.sensor.smoothing_window,
            cfg.calibration.clone(),
            cfg.monitor.min_voltage,
        )?,
    };

    let store = repo::open_store(&cfg.store, cfg.monitor.point_retention_days).await?;
    let state = RunningState::recover(store.as_ref(), &clock.now(), cfg.monitor.duplicate_threshold)
        .await
        .context("could not recover running totals")?;

    let mut engine = MonitorEngine::new(sampler, store, MonitorSettings::from(&cfg.monitor));
    if let Some(url) = cfg.emoncms.input_url.as_deref().filter(|u| !u.trim().is_empty()) {
        let timeout = Duration::from_secs(cfg.sensor.http_timeout_seconds);
        engine = engine.with_forwarder(EmoncmsForwarder::new(url.to_string(), timeout)?);
        info!("forwarding readings to emoncms");
    }

    info!(
        interval_secs = cfg.monitor.interval_seconds,
        window_start = cfg.monitor.window_start_hour,
        window_end = cfg.monitor.window_end_hour,
        mode = ?cfg.sensor.mode,
        point_retention_days = cfg.monitor.point_retention_days,
        "starting Open Energy Monitor"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(telemetry::shutdown_signal(cancel.clone()));

    let mut scheduler = Scheduler::new(engine, Arc::new(clock), cfg.monitor.interval_seconds);
    scheduler.run(state, cancel).await?;

    warn!("shutdown complete");
    Ok(())
}

fn build_source(cfg: &Config) -> Result<Arc<dyn SensorSource>> {
    match cfg.sensor.source {
        SourceKind::SmartPlug => Ok(Arc::new(SmartPlugSource::new(&cfg.sensor)?)),
        #[cfg(feature = "sim")]
        SourceKind::Simulated => {
            use open_energy_monitor::hardware::{simulated::SolarProfile, SimulatedSolarSource};
            warn!("using simulated PV source");
            let source = SimulatedSolarSource::new(SolarProfile::default(), cfg.calibration.clone())
                .in_zone(cfg.monitor.zone()?);
            Ok(Arc::new(source))
        }
        #[cfg(not(feature = "sim"))]
        SourceKind::Simulated => anyhow::bail!("sensor.source = simulated requires the `sim` feature"),
    }
}
