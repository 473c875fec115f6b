//! # Sensor driver capability.
//!
//! One driver per physical sensor. The poll task owns its driver, so `read`
//! takes `&mut self` and drivers may keep per-device state between cycles.

use async_trait::async_trait;

use crate::error::SensorError;
use crate::sensors::Reading;

/// Acquires one sample from a sensor.
///
/// Errors must be classified: [`SensorError::Io`] for bus/communication faults,
/// [`SensorError::Runtime`] for driver logic faults, [`SensorError::Other`] for
/// anything else. The variant selects the backoff.
#[async_trait]
pub trait SensorDriver: Send + 'static {
    async fn read(&mut self) -> Result<Reading, SensorError>;
}

#[async_trait]
impl SensorDriver for Box<dyn SensorDriver> {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        (**self).read().await
    }
}
