//! # Diagnostic events emitted by the supervisor and the agent tasks.
//!
//! The [`EventKind`] enum classifies records across five groups:
//! - **Sensor events**: one record per poll cycle (reading or classified fault)
//! - **Network events**: link transitions and connect failures
//! - **Time events**: sync attempts and their outcome
//! - **Dispatch events**: per-point outcome, skipped points, resource pressure
//! - **Runtime events**: task lifecycle, shutdown, subscriber health
//!
//! The [`Event`] struct carries optional metadata (task, channel, value,
//! status code, delay) on top of a human-readable message.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use envirovisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::SensorFailed)
//!     .with_task("bme680")
//!     .with_message("i/o error: nack")
//!     .with_delay(Duration::from_secs(10));
//!
//! assert_eq!(ev.kind, EventKind::SensorFailed);
//! assert_eq!(ev.task.as_deref(), Some("bme680"));
//! assert_eq!(ev.delay_ms, Some(10_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Sensor events ===
    /// A poll cycle produced a reading.
    ///
    /// Sets `task` (sensor name) and `message` (rendered reading).
    SensorRead,

    /// A poll cycle failed; the task backs off.
    ///
    /// Sets `task`, `message` (classified error) and `delay_ms` (backoff).
    SensorFailed,

    // === Network events ===
    /// Link came up.
    ///
    /// Sets `message` (device address).
    LinkConnected,

    /// Connect attempt failed; retry scheduled.
    ///
    /// Sets `message` (error) and `delay_ms`.
    LinkConnectFailed,

    /// Periodic check found the link down.
    LinkLost,

    // === Time events ===
    /// A sync request is about to be sent.
    TimeSyncStarted,

    /// Network time was applied.
    ///
    /// Sets `message` (formatted local timestamp) and `value` (offset from the
    /// host clock, seconds).
    TimeSynced,

    /// Sync request failed; trust flag untouched.
    ///
    /// Sets `message` (error).
    TimeSyncFailed,

    // === Dispatch events ===
    /// Point ingested (HTTP 204).
    ///
    /// Sets `channel`, `value`, `status`.
    PointSent,

    /// Store answered with something other than 204.
    ///
    /// Sets `channel`, `status`, `message` (response body).
    PointRejected,

    /// Transport failed before a status was received.
    ///
    /// Sets `channel`, `message` (error).
    PointFailed,

    /// Point not sent (non-finite value or stale channel).
    ///
    /// Sets `channel`, `message` (why).
    PointSkipped,

    /// Process health after a batch.
    ///
    /// Sets `message` (memory summary).
    ResourceReport,

    /// Display labels refreshed.
    ///
    /// Sets `message` (joined labels).
    DisplayUpdated,

    // === Runtime events ===
    /// Supervisor started a task.
    TaskStarting,

    /// Task returned normally (unexpected for long-lived tasks).
    TaskExited,

    /// Task returned an error or panicked. Fatal for the process.
    ///
    /// Sets `task` and `message`.
    TaskDied,

    /// Shutdown requested (OS signal observed).
    ShutdownRequested,

    /// All tasks stopped within configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some tasks did not stop in time.
    GraceExceeded,

    /// Subscriber panicked during event processing.
    ///
    /// Sets `task` (subscriber name) and `message` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
}

/// Diagnostic event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the emitting task, if applicable.
    pub task: Option<Arc<str>>,
    /// Reading-store channel id, if applicable.
    pub channel: Option<Arc<str>>,
    /// Channel value, if applicable.
    pub value: Option<f64>,
    /// HTTP status code, if applicable.
    pub status: Option<u16>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable message (reading, error, body, timestamp).
    pub message: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            channel: None,
            value: None,
            status: None,
            delay_ms: None,
            message: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a channel id.
    #[inline]
    pub fn with_channel(mut self, channel: impl Into<Arc<str>>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attaches a channel value.
    #[inline]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Attaches an HTTP status code.
    #[inline]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable message.
    #[inline]
    pub fn with_message(mut self, message: impl Into<Arc<str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_message(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_message(info)
    }
}
