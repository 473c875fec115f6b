//! # Single-writer facts shared between tasks.
//!
//! - **Link up**: written by the connectivity watchdog only.
//! - **Clock trustworthy**: written by the time sync task only.
//!
//! Each fact is a [`tokio::sync::watch`] pair. The writer half is not `Clone`,
//! so whoever owns it is the only task that can change the fact; readers are
//! cheap clones handed to every consumer.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::tasks::pause;

/// Creates the "link up" fact, initially down.
pub fn link_state() -> (LinkWriter, LinkReader) {
    let (tx, rx) = watch::channel(false);
    (LinkWriter(tx), LinkReader(rx))
}

/// Owner of the "link up" fact.
#[derive(Debug)]
pub struct LinkWriter(watch::Sender<bool>);

impl LinkWriter {
    pub fn set(&self, up: bool) {
        self.0.send_replace(up);
    }

    pub fn reader(&self) -> LinkReader {
        LinkReader(self.0.subscribe())
    }
}

/// Read-only view of the "link up" fact.
#[derive(Clone, Debug)]
pub struct LinkReader(watch::Receiver<bool>);

impl LinkReader {
    pub fn is_up(&self) -> bool {
        *self.0.borrow()
    }
}

/// Last successful synchronization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSync {
    /// Network time at the moment it was applied.
    pub at: DateTime<FixedOffset>,
    /// Network time minus local time.
    pub offset: TimeDelta,
}

/// Creates the "clock trustworthy" fact, initially untrusted.
pub fn clock_state() -> (ClockWriter, ClockReader) {
    let (tx, rx) = watch::channel(None);
    (ClockWriter(tx), ClockReader(rx))
}

/// Owner of the "clock trustworthy" fact.
///
/// There is no way to revoke trust: only a newer successful sync replaces the
/// recorded one.
#[derive(Debug)]
pub struct ClockWriter(watch::Sender<Option<ClockSync>>);

impl ClockWriter {
    pub fn mark_synced(&self, sync: ClockSync) {
        self.0.send_replace(Some(sync));
    }

    pub fn reader(&self) -> ClockReader {
        ClockReader(self.0.subscribe())
    }
}

/// Read-only view of the "clock trustworthy" fact.
#[derive(Clone, Debug)]
pub struct ClockReader(watch::Receiver<Option<ClockSync>>);

impl ClockReader {
    pub fn is_trusted(&self) -> bool {
        self.0.borrow().is_some()
    }
}

/// Re-checks `ready` every `every` until it holds.
///
/// Fails with [`TaskError::Canceled`] if `ctx` is cancelled first.
pub async fn poll_until(
    ctx: &CancellationToken,
    every: Duration,
    mut ready: impl FnMut() -> bool,
) -> Result<(), TaskError> {
    loop {
        if ready() {
            return Ok(());
        }
        pause(ctx, every).await?;
    }
}
