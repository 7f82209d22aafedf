//! Energy integration and cumulative bucket bookkeeping.

pub mod buckets;
pub mod integrator;
pub mod state;

pub use buckets::{BucketAccumulator, Rollover};
pub use integrator::energy_delta_kwh;
pub use state::RunningState;
