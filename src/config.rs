use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::metering::Calibration;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub monitor: MonitorConfig,
    #[validate(nested)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub emoncms: EmoncmsConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct MonitorConfig {
    #[validate(range(min = 1, max = 86_400))]
    pub interval_seconds: u64,
    #[validate(range(max = 23))]
    pub window_start_hour: u32,
    #[validate(range(min = 1, max = 24))]
    pub window_end_hour: u32,
    #[validate(range(min = 0.0))]
    pub negligible_power_w: f64,
    pub duplicate_threshold: u32,
    #[validate(range(min = 0.0))]
    pub min_voltage: f64,
    /// IANA zone used for bucket keys and the admission window; system local when unset
    #[serde(default)]
    pub timezone: Option<String>,
    /// Retention applied by the external purge job
    pub point_retention_days: u32,
}

fn validate_window(cfg: &MonitorConfig) -> Result<(), ValidationError> {
    if cfg.window_start_hour >= cfg.window_end_hour {
        return Err(ValidationError::new("window_start_hour must be before window_end_hour"));
    }
    Ok(())
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            window_start_hour: 6,
            window_end_hour: 21,
            negligible_power_w: 0.001,
            duplicate_threshold: 10,
            min_voltage: 2.0,
            timezone: None,
            point_retention_days: 90,
        }
    }
}

impl MonitorConfig {
    pub fn zone(&self) -> Result<Option<Tz>> {
        self.timezone
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse::<Tz>()
                    .map_err(|e| anyhow::anyhow!("invalid monitor.timezone {s:?}: {e}"))
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SmartPlug,
    Simulated,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorMode {
    /// Voltage, current and power read from a metering endpoint
    Metered,
    /// Raw ADC counts smoothed and calibrated locally
    Raw,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SensorConfig {
    pub source: SourceKind,
    pub mode: SensorMode,
    pub base_url: String,
    pub voltage_path: String,
    pub current_path: String,
    pub power_path: String,
    pub raw_voltage_path: String,
    pub raw_current_path: String,
    #[validate(range(min = 1, max = 300))]
    pub http_timeout_seconds: u64,
    #[validate(range(min = 1, max = 1_000))]
    pub smoothing_window: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::SmartPlug,
            mode: SensorMode::Metered,
            base_url: "http://127.0.0.1".to_string(),
            voltage_path: "/sensor/kauf_plug_voltage".to_string(),
            current_path: "/sensor/kauf_plug_current".to_string(),
            power_path: "/sensor/kauf_plug_power".to_string(),
            raw_voltage_path: "/sensor/raw_a0".to_string(),
            raw_current_path: "/sensor/raw_a1".to_string(),
            http_timeout_seconds: 5,
            smoothing_window: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// PostgreSQL URL; empty keeps totals in memory only
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmoncmsConfig {
    /// Full input URL including node and apikey, e.g. `https://host/input/post?node=pv&apikey=...`
    #[serde(default)]
    pub input_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("PVMON__").split("__"));
        let cfg: Config = figment.extract().context("configuration could not be loaded")?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Validate field ranges and cross-field rules.
    pub fn check(&self) -> Result<()> {
        self.validate().context("configuration is invalid")?;
        self.monitor.zone()?;
        if self.sensor.source == SourceKind::SmartPlug {
            let url = self.sensor.base_url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("sensor.base_url must be an http(s) URL, got {url:?}");
            }
        }
        if self.sensor.mode == SensorMode::Raw {
            let cal = &self.calibration;
            if cal.mv_per_amp == 0.0 {
                anyhow::bail!("calibration.mv_per_amp must be nonzero in raw mode");
            }
            if cal.adc_max <= 0.0 || cal.adc_max <= cal.adc_adjust {
                anyhow::bail!(
                    "calibration.adc_max ({}) must be positive and above adc_adjust ({})",
                    cal.adc_max,
                    cal.adc_adjust
                );
            }
            if cal.r1_ohms < 0.0 || cal.r2_ohms <= 0.0 {
                anyhow::bail!("calibration.r2_ohms must be positive and r1_ohms not negative");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            monitor: MonitorConfig::default(),
            sensor: SensorConfig::default(),
            calibration: Calibration::default(),
            store: StoreConfig::default(),
            emoncms: EmoncmsConfig::default(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(valid().check().is_ok());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut cfg = valid();
        cfg.monitor.window_start_hour = 21;
        cfg.monitor.window_end_hour = 6;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut cfg = valid();
        cfg.monitor.interval_seconds = 0;
        assert!(cfg.check().is_err());
    }

    #[test]
    fn test_bad_timezone_rejected() {
        let mut cfg = valid();
        cfg.monitor.timezone = Some("Mars/Olympus".to_string());
        assert!(cfg.check().is_err());

        cfg.monitor.timezone = Some("America/New_York".to_string());
        assert_eq!(cfg.monitor.zone().unwrap(), Some(chrono_tz::America::New_York));
    }

    #[rstest::rstest]
    #[case::adc_adjust_equals_max(|c: &mut Calibration| c.adc_adjust = c.adc_max)]
    #[case::zero_adc_max(|c: &mut Calibration| c.adc_max = 0.0)]
    #[case::zero_divider(|c: &mut Calibration| { c.r1_ohms = 0.0; c.r2_ohms = 0.0 })]
    #[case::zero_low_side(|c: &mut Calibration| c.r2_ohms = 0.0)]
    #[case::zero_sensitivity(|c: &mut Calibration| c.mv_per_amp = 0.0)]
    fn test_degenerate_calibration_rejected_in_raw_mode(#[case] tweak: fn(&mut Calibration)) {
        let mut cfg = valid();
        cfg.sensor.mode = SensorMode::Raw;
        assert!(cfg.check().is_ok());

        tweak(&mut cfg.calibration);
        assert!(cfg.check().is_err());

        // metered mode never uses the calibration
        cfg.sensor.mode = SensorMode::Metered;
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn test_smart_plug_requires_http_url() {
        let mut cfg = valid();
        cfg.sensor.base_url = "kauf-plug.local".to_string();
        assert!(cfg.check().is_err());
    }

    #[test]
    fn test_toml_and_env_merge() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [monitor]
                interval_seconds = 15
                window_start_hour = 6
                window_end_hour = 21
                negligible_power_w = 0.001
                duplicate_threshold = 10
                min_voltage = 2.0
                point_retention_days = 30

                [sensor]
                source = "smart_plug"
                mode = "metered"
                base_url = "http://plug.local"
                voltage_path = "/sensor/kauf_plug_voltage"
                current_path = "/sensor/kauf_plug_current"
                power_path = "/sensor/kauf_plug_power"
                raw_voltage_path = "/sensor/raw_a0"
                raw_current_path = "/sensor/raw_a1"
                http_timeout_seconds = 5
                smoothing_window = 10
                "#,
            )?;
            jail.set_env("PVMON__MONITOR__INTERVAL_SECONDS", "30");

            let cfg: Config = Figment::new()
                .merge(Toml::file("config.toml"))
                .merge(Env::prefixed("PVMON__").split("__"))
                .extract()?;
            assert_eq!(cfg.monitor.interval_seconds, 30);
            assert_eq!(cfg.sensor.mode, SensorMode::Metered);
            assert_eq!(cfg.calibration, Calibration::default());
            assert!(cfg.emoncms.input_url.is_none());
            Ok(())
        });
    }
}
