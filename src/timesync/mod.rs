//! # Wall-clock synchronization.
//!
//! - [`TimeSource`] network time capability
//! - [`SntpClient`] SNTP over UDP
//! - [`TimeSync`] the task that owns "clock trustworthy"

mod sntp;
mod source;
mod task;

pub use sntp::SntpClient;
pub use source::{MakeTimeSource, TimeSource};
pub use task::TimeSync;
