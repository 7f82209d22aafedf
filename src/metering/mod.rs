//! Turning sensor feeds into clean samples.

pub mod anomaly;
pub mod calibration;
pub mod sampler;
pub mod smoother;

pub use anomaly::{AnomalyDetector, StuckSensor};
pub use calibration::Calibration;
pub use sampler::{PowerSampler, Reading};
pub use smoother::SignalSmoother;
