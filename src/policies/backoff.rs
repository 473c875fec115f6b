//! # Backoff policy for faulted sensor polls.
//!
//! [`FaultBackoff`] maps each [`SensorError`] class to a fixed extra delay.
//! The delay does not grow with repeated failures: a sensor that keeps failing
//! is retried every `backoff + interval`, forever, and a single success returns
//! the task to its plain interval.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use envirovisor::{FaultBackoff, SensorError};
//!
//! let backoff = FaultBackoff::default();
//!
//! assert_eq!(backoff.delay_for(&SensorError::Io("nack".into())), Duration::from_secs(10));
//! assert_eq!(backoff.delay_for(&SensorError::Runtime("crc".into())), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::error::SensorError;

/// Fault classification table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultBackoff {
    /// Delay after a bus/communication fault.
    pub io: Duration,
    /// Delay after a driver logic/state fault.
    pub runtime: Duration,
    /// Delay after anything the driver could not classify.
    pub unclassified: Duration,
}

impl Default for FaultBackoff {
    /// Returns the table with:
    /// - `io = 10s`;
    /// - `runtime = 5s`;
    /// - `unclassified = 10s`.
    fn default() -> Self {
        Self {
            io: Duration::from_secs(10),
            runtime: Duration::from_secs(5),
            unclassified: Duration::from_secs(10),
        }
    }
}

impl FaultBackoff {
    /// Extra delay to apply after `err`, before the regular poll interval.
    pub fn delay_for(&self, err: &SensorError) -> Duration {
        match err {
            SensorError::Io(_) => self.io,
            SensorError::Runtime(_) => self.runtime,
            SensorError::Other(_) => self.unclassified,
        }
    }
}
