//! Fault policies.
//!
//! This module groups the knobs that control **how long** a poll task waits
//! after a classified sensor fault.
//!
//! ## Contents
//! - [`FaultBackoff`] fault class → extra delay (io / runtime / unclassified)
//!
//! ## Quick wiring
//! ```text
//! BackoffConfig ──policy()──► FaultBackoff
//!      └─► sensors::PollTask uses:
//!           - delay_for(&SensorError) before the regular interval sleep
//! ```
//!
//! ## Defaults
//! - io = 10s, runtime = 5s, unclassified = 10s.

mod backoff;

pub use backoff::FaultBackoff;
