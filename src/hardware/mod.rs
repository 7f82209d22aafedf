pub mod smart_plug;
#[cfg(feature = "sim")]
pub mod simulated;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Channel;

pub use smart_plug::SmartPlugSource;
#[cfg(feature = "sim")]
pub use simulated::SimulatedSolarSource;

/// Sensor read errors. All of them are transient from the monitor's view.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Transport error reading {channel}: {message}")]
    Transport { channel: Channel, message: String },
    #[error("HTTP {status} reading {channel}")]
    Status { channel: Channel, status: u16 },
    #[error("Unparsable body for {channel}: {message}")]
    Parse { channel: Channel, message: String },
    #[error("Channel {0} not provided by this source")]
    Unsupported(Channel),
}

/// A source of instantaneous sensor values, one channel at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorSource: Send + Sync {
    async fn read(&self, channel: Channel) -> Result<f64, SensorError>;
}
