//! # Sensors.
//!
//! - [`SensorDriver`] capability every sensor implements
//! - [`PollTask`] the one generic poll loop, instantiated per enabled sensor
//! - [`SensorKind`] catalog of known sensors, channels and wire names
//! - [`SysfsDriver`] driver reading Linux sysfs/IIO attributes

mod catalog;
mod driver;
mod poll;
mod reading;
mod sysfs;

pub use catalog::{SensorKind, altitude_m, channels_of};
pub use driver::SensorDriver;
pub use poll::PollTask;
pub use reading::Reading;
pub use sysfs::SysfsDriver;
