//! # Time sync task.
//!
//! ```text
//! poll_until(link up)                (every gate_poll)
//! source = make(utc_offset)          (once for the process lifetime)
//! loop:
//!   TimeSyncStarted
//!   source.now()
//!     ├─ Ok(t)  → clock.mark_synced(t) → TimeSynced("%Y-%m-%d %H:%M:%S", offset_s)
//!     └─ Err(e) → TimeSyncFailed        (trust left as it was)
//!   sleep(resync_interval)
//! ```
//!
//! The wall clock itself is not stepped: the agent records the measured offset
//! and flips "clock trustworthy". A later link drop does not rebuild the source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::state::{ClockSync, ClockWriter, LinkReader, poll_until};
use crate::tasks::{Task, pause};
use crate::timesync::MakeTimeSource;

/// Keeps "clock trustworthy" current.
pub struct TimeSync {
    make_source: MakeTimeSource,
    utc_offset: FixedOffset,
    link: LinkReader,
    clock: ClockWriter,
    gate_poll: Duration,
    resync_interval: Duration,
    bus: Bus,
}

impl TimeSync {
    pub fn new(
        make_source: MakeTimeSource,
        utc_offset: FixedOffset,
        link: LinkReader,
        clock: ClockWriter,
        bus: Bus,
    ) -> Self {
        Self {
            make_source,
            utc_offset,
            link,
            clock,
            gate_poll: Duration::from_secs(1),
            resync_interval: Duration::from_secs(3600),
            bus,
        }
    }

    pub fn with_intervals(mut self, gate_poll: Duration, resync_interval: Duration) -> Self {
        self.gate_poll = gate_poll;
        self.resync_interval = resync_interval;
        self
    }
}

#[async_trait]
impl Task for TimeSync {
    fn name(&self) -> &str {
        "timesync"
    }

    async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError> {
        let TimeSync {
            make_source,
            utc_offset,
            link,
            clock,
            gate_poll,
            resync_interval,
            bus,
        } = *self;

        poll_until(&ctx, gate_poll, || link.is_up()).await?;
        let mut source = make_source(utc_offset);

        loop {
            bus.publish(Event::new(EventKind::TimeSyncStarted));

            let res = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                res = source.now() => res,
            };
            match res {
                Ok(now) => {
                    let sync = ClockSync {
                        at: now,
                        offset: now.signed_duration_since(Utc::now()),
                    };
                    clock.mark_synced(sync);
                    bus.publish(
                        Event::new(EventKind::TimeSynced)
                            .with_value(sync.offset.num_milliseconds() as f64 / 1000.0)
                            .with_message(sync.at.format("%Y-%m-%d %H:%M:%S").to_string()),
                    );
                }
                Err(e) => {
                    bus.publish(Event::new(EventKind::TimeSyncFailed).with_message(e.to_string()));
                }
            }

            pause(&ctx, resync_interval).await?;
        }
    }
}
