//! Forwarding of accepted readings to an emoncms input endpoint.
//!
//! emoncms takes the reading as a `fulljson` query parameter appended to the
//! configured input URL (which already carries the node and API key).

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::time::Duration;

use crate::domain::{fixed, Sample};

#[derive(Debug, Serialize, PartialEq)]
struct InputPayload {
    #[serde(rename = "pvVolts")]
    pv_volts: String,
    #[serde(rename = "pvAmps")]
    pv_amps: String,
    #[serde(rename = "pvWatts")]
    pv_watts: String,
}

impl From<&Sample> for InputPayload {
    fn from(sample: &Sample) -> Self {
        Self {
            pv_volts: fixed(sample.voltage),
            pv_amps: fixed(sample.current),
            pv_watts: fixed(sample.power),
        }
    }
}

#[derive(Clone)]
pub struct EmoncmsForwarder {
    input_url: String,
    client: reqwest::Client,
}

impl EmoncmsForwarder {
    pub fn new(input_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("open-energy-monitor/0.1"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { input_url, client })
    }

    pub async fn forward(&self, sample: &Sample) -> Result<()> {
        let payload = serde_json::to_string(&InputPayload::from(sample))?;
        let resp = self
            .client
            .get(&self.input_url)
            .query(&[("fulljson", payload)])
            .send()
            .await
            .context("emoncms GET failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("emoncms input error: HTTP {status}");
        }
        Ok(())
    }
}
