//! Diagnostic events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** every agent
//! task publishes its per-cycle diagnostic records to.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor`, `PollTask`, `Watchdog`, `TimeSync`,
//!   `Dispatcher`, `DisplayTask`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Supervisor::subscriber_listener()` fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
