//! # Telemetry pipeline.
//!
//! ```text
//! ReadingStore ──snapshot──► Dispatcher ──LinePoint::encode──► Transport ──POST──► store
//!                                 └──► ResourceProbe (after each batch)
//! ```
//!
//! - [`LinePoint`] line-protocol encoding and parsing
//! - [`Transport`] / [`InfluxTransport`] one persistent session with the store
//! - [`Dispatcher`] the gated, fixed-cadence send loop
//! - [`ResourceProbe`] / [`ProcMeminfo`] process health after each batch

mod dispatcher;
mod line_protocol;
mod resources;
mod transport;

pub use dispatcher::{Connect, DispatchSettings, Dispatcher};
pub use line_protocol::LinePoint;
pub use resources::{MemoryReport, ProcMeminfo, ResourceProbe};
pub use transport::{InfluxTransport, StoreResponse, Transport};
