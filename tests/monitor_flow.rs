//! End-to-end ticks against a mock ESPHome plug and the in-memory store.

use chrono::{DateTime, FixedOffset, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use open_energy_monitor::accounting::RunningState;
use open_energy_monitor::config::SensorConfig;
use open_energy_monitor::controller::{MonitorEngine, MonitorSettings, TickOutcome};
use open_energy_monitor::domain::TotalKind;
use open_energy_monitor::emoncms::EmoncmsForwarder;
use open_energy_monitor::hardware::SmartPlugSource;
use open_energy_monitor::metering::{Calibration, PowerSampler};
use open_energy_monitor::repo::MemoryStore;

fn at(h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 21, h, m, s)
        .unwrap()
}

async fn serve(server: &MockServer, sensor_path: &str, value: f64) {
    Mock::given(method("GET"))
        .and(path(sensor_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": format!("sensor-{}", sensor_path.trim_start_matches("/sensor/")),
            "state": format!("{value}"),
            "value": value,
        })))
        .mount(server)
        .await;
}

fn plug(server: &MockServer) -> Arc<SmartPlugSource> {
    let cfg = SensorConfig {
        base_url: server.uri(),
        ..SensorConfig::default()
    };
    Arc::new(SmartPlugSource::new(&cfg).unwrap())
}

#[tokio::test]
async fn test_metered_plug_accumulates_and_forwards() {
    let plug_server = MockServer::start().await;
    serve(&plug_server, "/sensor/kauf_plug_voltage", 121.4).await;
    serve(&plug_server, "/sensor/kauf_plug_current", 3.6).await;
    serve(&plug_server, "/sensor/kauf_plug_power", 432.0).await;

    let emoncms = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/input/post"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&emoncms)
        .await;

    let store = Arc::new(MemoryStore::new());
    let forwarder = EmoncmsForwarder::new(
        format!("{}/input/post?node=pv", emoncms.uri()),
        Duration::from_secs(2),
    )
    .unwrap();
    let mut engine = MonitorEngine::new(
        PowerSampler::metered(plug(&plug_server), 2.0),
        store.clone(),
        MonitorSettings::default(),
    )
    .with_forwarder(forwarder);
    let mut state = RunningState::recover(store.as_ref(), &at(12, 0, 0), 10)
        .await
        .unwrap();

    for s in [0, 10, 20] {
        engine.tick(&mut state, at(12, 0, s)).await.unwrap();
    }

    // 432 W for 20 s
    assert!((state.buckets.day_kwh() - 0.0024).abs() < 1e-9);
    let points = store.points().await;
    assert_eq!(points.len(), 3);
    assert_eq!(points[0].pv_watts, "432.000");
    assert_eq!(points[0].point_day, 20240621);
    let day = store.total(TotalKind::Day, 20240621).await.unwrap();
    assert_eq!(day.total_value, "0.002");
    assert_eq!(day.peak_current.as_deref(), Some("3.600"));
}

#[tokio::test]
async fn test_raw_mode_waits_for_full_smoothing_window() {
    let server = MockServer::start().await;
    serve(&server, "/sensor/raw_a0", 700.0).await;
    serve(&server, "/sensor/raw_a1", 520.0).await;

    let store = Arc::new(MemoryStore::new());
    let sampler = PowerSampler::raw(plug(&server), 3, Calibration::default(), 2.0).unwrap();
    let mut engine = MonitorEngine::new(sampler, store.clone(), MonitorSettings::default());
    let mut state = RunningState::new(&at(12, 0, 0), 10);

    for s in [0, 10] {
        let report = engine.tick(&mut state, at(12, 0, s)).await.unwrap();
        assert_eq!(report.outcome, TickOutcome::Negligible);
    }
    let report = engine.tick(&mut state, at(12, 0, 20)).await.unwrap();
    assert_eq!(report.outcome, TickOutcome::Accepted { delta_kwh: None });

    let sample = report.sample.unwrap();
    assert!((sample.voltage - 119.839).abs() < 1e-3);
    assert!((sample.current - 2.8770).abs() < 1e-3);
    assert!((sample.power - sample.voltage * sample.current).abs() < 1e-9);
    assert_eq!(store.points().await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_plug_is_negligible_and_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut engine = MonitorEngine::new(
        PowerSampler::metered(plug(&server), 2.0),
        store.clone(),
        MonitorSettings::default(),
    );
    let mut state = RunningState::new(&at(12, 0, 0), 10);

    let report = engine.tick(&mut state, at(12, 0, 0)).await.unwrap();
    assert_eq!(report.read_failures, 3);
    assert_eq!(report.outcome, TickOutcome::Negligible);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_restart_continues_from_persisted_totals() {
    let server = MockServer::start().await;
    serve(&server, "/sensor/kauf_plug_voltage", 120.0).await;
    serve(&server, "/sensor/kauf_plug_current", 15.0).await;
    serve(&server, "/sensor/kauf_plug_power", 1800.0).await;
    let store = Arc::new(MemoryStore::new());

    let mut first = MonitorEngine::new(
        PowerSampler::metered(plug(&server), 2.0),
        store.clone(),
        MonitorSettings::default(),
    );
    let mut state = RunningState::recover(store.as_ref(), &at(12, 0, 0), 10)
        .await
        .unwrap();
    first.tick(&mut state, at(12, 0, 0)).await.unwrap();
    first.tick(&mut state, at(12, 10, 0)).await.unwrap();
    assert!((state.buckets.day_kwh() - 0.3).abs() < 1e-9);
    drop(first);

    let mut second = MonitorEngine::new(
        PowerSampler::metered(plug(&server), 2.0),
        store.clone(),
        MonitorSettings::default(),
    );
    let mut state = RunningState::recover(store.as_ref(), &at(12, 15, 0), 10)
        .await
        .unwrap();
    assert_eq!(state.buckets.day_kwh(), 0.3);
    assert_eq!(state.buckets.peak_power(), 1800.0);

    // first tick after a restart has nothing to integrate against
    let report = second.tick(&mut state, at(12, 15, 0)).await.unwrap();
    assert_eq!(report.outcome, TickOutcome::Accepted { delta_kwh: None });
    second.tick(&mut state, at(12, 25, 0)).await.unwrap();

    let day = store.total(TotalKind::Day, 20240621).await.unwrap();
    assert_eq!(day.total_value, "0.600");
    let year = store.total(TotalKind::Year, 2024).await.unwrap();
    assert_eq!(year.total_value, "0.600");
}
