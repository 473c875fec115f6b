//! # envirovisor
//!
//! **Envirovisor** is a telemetry agent for small environmental monitoring
//! stations. It polls a fixed set of sensors, keeps the latest value of every
//! channel, keeps the network link and wall clock healthy, and ships readings
//! to an InfluxDB v2 bucket as line-protocol points.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!   │  PollTask    │   │  PollTask    │   │  PollTask    │
//!   │  (bme680)    │   │  (scd4x)     │   │  (radsens)   │
//!   └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!          │ ChannelWriter    │                  │
//!          ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ReadingStore (latest value per channel, declaration order)       │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        │ snapshot()                                   │ get()
//!        ▼                                              ▼
//! ┌──────────────┐  link up?  ┌──────────────┐    ┌──────────────┐
//! │  Dispatcher  │◄───────────│   Watchdog   │    │ DisplayTask  │
//! │ (POST lines) │◄──────┐    └──────┬───────┘    └──────────────┘
//! └──────┬───────┘       │           │ link up?
//!        │ HTTP     clock trusted?   ▼
//!        ▼               │    ┌──────────────┐
//!    InfluxDB v2         └────│   TimeSync   │
//!                             └──────────────┘
//!
//! Every task ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                          (in Supervisor)          ├─► LogWriter ─► tracing
//!                                                                   └─► custom sinks
//! ```
//!
//! ### Lifecycle
//! ```text
//! AgentConfig ──► AgentBuilder ──► Agent { Supervisor, tasks } ──► run()
//!
//! Supervisor:
//!   ├─► publish TaskStarting{ task } for every task, spawn on one token tree
//!   ├─► task returns Ok(())            ─► TaskExited, others keep running
//!   ├─► task returns Err / panics      ─► TaskDied, cancel all, RuntimeError::TaskDied
//!   └─► SIGINT/SIGTERM/SIGQUIT         ─► ShutdownRequested, cancel all, wait grace
//!                                           ├─ all stopped ─► AllStoppedWithin
//!                                           └─ timeout     ─► GraceExceeded{ stuck }
//! ```
//!
//! Faults below the supervisor never escape: poll tasks back off per fault
//! class, the watchdog retries association, time sync retries on its resync
//! cadence and the dispatcher logs failed POSTs and moves on.
//!
//! ## Features
//! | Area              | Description                                             | Key types / traits                        |
//! |-------------------|---------------------------------------------------------|-------------------------------------------|
//! | **Sensors**       | Catalog, drivers and fixed-cadence polling.             | [`SensorKind`], [`SensorDriver`], [`PollTask`] |
//! | **State**         | Latest readings and single-writer link/clock flags.     | [`ReadingStore`], [`LinkReader`], [`ClockReader`] |
//! | **Telemetry**     | Line protocol and delivery to the metrics store.        | [`LinePoint`], [`Transport`], [`Dispatcher`] |
//! | **Network & time**| Link watchdog and SNTP synchronization.                 | [`Watchdog`], [`TimeSync`]                |
//! | **Subscriber API**| Hook into agent events (logging, metrics, custom sinks).| [`Subscribe`], [`LogWriter`]              |
//! | **Supervision**   | Start, watch and stop the agent tasks.                  | [`Supervisor`], [`Agent`]                 |
//! | **Errors**        | Typed errors per concern.                               | [`TaskError`], [`RuntimeError`], [`SensorError`] |
//! | **Configuration** | TOML settings with defaults and validation.             | [`AgentConfig`]                           |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use envirovisor::{Bus, Event, EventKind, Supervisor, Task, TaskError, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = Bus::new(64);
//!     let mut rx = bus.subscribe();
//!     let sup = Supervisor::new(Duration::from_secs(1), bus, Vec::new());
//!
//!     let hello = TaskFn::boxed("hello", |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Err(TaskError::Canceled)
//!     });
//!     assert_eq!(hello.name(), "hello");
//!
//!     sup.run_until(vec![hello], tokio::time::sleep(Duration::from_millis(10)))
//!         .await?;
//!
//!     let first: Event = rx.recv().await?;
//!     assert_eq!(first.kind, EventKind::TaskStarting);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod display;
mod error;
mod events;
mod network;
mod policies;
mod sensors;
mod state;
mod subscribers;
mod tasks;
mod telemetry;
mod timesync;

// ---- Public re-exports ----

pub use config::{
    AgentConfig, BackoffConfig, DispatchConfig, DisplayConfig, FieldSource, GatePolicy,
    InfluxConfig, NetworkConfig, SensorConfig, SensorsConfig, TimeConfig,
};
pub use core::{Agent, AgentBuilder, Collaborators, Supervisor};
pub use display::{DisplaySink, DisplayTask, LogDisplay};
pub use error::{
    BuildError, ConfigError, EncodeError, LinkError, ParseError, RuntimeError, SensorError,
    StateError, TaskError, TimeError, TransportError,
};
pub use events::{Bus, Event, EventKind};
pub use network::{Credentials, NetworkLink, NmcliLink, Watchdog};
pub use policies::FaultBackoff;
pub use sensors::{PollTask, Reading, SensorDriver, SensorKind, SysfsDriver, altitude_m, channels_of};
pub use state::{
    ChannelSnapshot, ChannelSpec, ChannelWriter, ClockReader, ClockSync, ClockWriter, LinkReader,
    LinkWriter, ReadingStore, clock_state, link_state, poll_until,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Task, TaskBox, TaskFn, pause};
pub use telemetry::{
    Connect, DispatchSettings, Dispatcher, InfluxTransport, LinePoint, MemoryReport, ProcMeminfo,
    ResourceProbe, StoreResponse, Transport,
};
pub use timesync::{MakeTimeSource, SntpClient, TimeSource, TimeSync};
