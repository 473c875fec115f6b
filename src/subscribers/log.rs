//! # LogWriter — renders diagnostic events through `tracing`
//!
//! ## Example output
//! ```text
//! INFO  sensor=bme680 reading="temperature=21.5 humidity=40.1 ..."
//! WARN  sensor=scd4x delay_ms=10000 err="i/o error: nack"
//! INFO  ip=192.168.1.40 "link connected"
//! ERROR channel=scd4x.co2 status=400 body="..." "point rejected"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let channel = e.channel.as_deref().unwrap_or("-");
        let msg = e.message.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SensorRead => info!(sensor = task, reading = msg, "sensor read"),
            EventKind::SensorFailed => {
                warn!(sensor = task, delay_ms = e.delay_ms, err = msg, "sensor read failed")
            }
            EventKind::LinkConnected => info!(ip = msg, "link connected"),
            EventKind::LinkConnectFailed => {
                error!(delay_ms = e.delay_ms, err = msg, "link connection attempt failed")
            }
            EventKind::LinkLost => warn!("link lost"),
            EventKind::TimeSyncStarted => info!("syncing time"),
            EventKind::TimeSynced => {
                info!(time = msg, offset_s = e.value, "time synchronized")
            }
            EventKind::TimeSyncFailed => error!(err = msg, "failed to sync time"),
            EventKind::PointSent => info!(channel, value = e.value, "point sent"),
            EventKind::PointRejected => {
                error!(channel, status = e.status, body = msg, "point rejected")
            }
            EventKind::PointFailed => error!(channel, err = msg, "error sending point"),
            EventKind::PointSkipped => warn!(channel, reason = msg, "point skipped"),
            EventKind::ResourceReport => info!(memory = msg, "resources"),
            EventKind::DisplayUpdated => debug!(labels = msg, "display updated"),
            EventKind::TaskStarting => debug!(task, "task starting"),
            EventKind::TaskExited => warn!(task, "task returned"),
            EventKind::TaskDied => error!(task, err = msg, "task died"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithin => info!("all tasks stopped within grace"),
            EventKind::GraceExceeded => error!(stuck = msg, "grace exceeded"),
            EventKind::SubscriberPanicked => {
                error!(subscriber = task, info = msg, "subscriber panicked")
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = task, reason = msg, "subscriber overflow")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
