//! HTTP client for an ESPHome smart plug REST API.
//!
//! Each channel is a separate `GET`, answered with a body such as
//! `{"id":"sensor-kauf_plug_power","state":"0.4 W","value":0.379758}`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{SensorError, SensorSource};
use crate::config::SensorConfig;
use crate::domain::Channel;

#[derive(Debug, Deserialize)]
struct SensorValue {
    value: f64,
}

#[derive(Clone)]
pub struct SmartPlugSource {
    base_url: String,
    client: reqwest::Client,
    paths: ChannelPaths,
}

#[derive(Debug, Clone)]
struct ChannelPaths {
    voltage: String,
    current: String,
    power: String,
    raw_voltage: String,
    raw_current: String,
}

impl SmartPlugSource {
    pub fn new(cfg: &SensorConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("open-energy-monitor/0.1"),
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds.max(1)))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
            paths: ChannelPaths {
                voltage: cfg.voltage_path.clone(),
                current: cfg.current_path.clone(),
                power: cfg.power_path.clone(),
                raw_voltage: cfg.raw_voltage_path.clone(),
                raw_current: cfg.raw_current_path.clone(),
            },
        })
    }

    fn url_for(&self, channel: Channel) -> String {
        let path = match channel {
            Channel::Voltage => &self.paths.voltage,
            Channel::Current => &self.paths.current,
            Channel::Power => &self.paths.power,
            Channel::RawVoltage => &self.paths.raw_voltage,
            Channel::RawCurrent => &self.paths.raw_current,
        };
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SensorSource for SmartPlugSource {
    async fn read(&self, channel: Channel) -> Result<f64, SensorError> {
        let url = self.url_for(channel);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SensorError::Transport {
                channel,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SensorError::Status {
                channel,
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| SensorError::Transport {
            channel,
            message: e.to_string(),
        })?;
        let parsed: SensorValue = serde_json::from_str(&body).map_err(|e| SensorError::Parse {
            channel,
            message: e.to_string(),
        })?;

        debug!(%channel, value = parsed.value, "sensor read");
        Ok(parsed.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SensorConfig {
        SensorConfig {
            base_url: server.uri(),
            ..SensorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_reads_value_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sensor/kauf_plug_power"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"id":"sensor-kauf_plug_power","state":"0.4 W","value":0.379758}"#,
            ))
            .mount(&server)
            .await;

        let source = SmartPlugSource::new(&config_for(&server)).unwrap();
        let value = source.read(Channel::Power).await.unwrap();
        assert!((value - 0.379758).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = SmartPlugSource::new(&config_for(&server)).unwrap();
        let err = source.read(Channel::Voltage).await.unwrap_err();
        assert!(matches!(err, SensorError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_unparsable_body_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let source = SmartPlugSource::new(&config_for(&server)).unwrap();
        let err = source.read(Channel::Current).await.unwrap_err();
        assert!(matches!(err, SensorError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let cfg = SensorConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            http_timeout_seconds: 1,
            ..SensorConfig::default()
        };
        let source = SmartPlugSource::new(&cfg).unwrap();
        let err = source.read(Channel::Power).await.unwrap_err();
        assert!(matches!(err, SensorError::Transport { .. }));
    }
}
