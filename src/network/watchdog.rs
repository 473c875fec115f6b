//! # Connectivity watchdog.
//!
//! ```text
//!             connect() Err → LinkConnectFailed, sleep(connect_retry)
//!            ┌───────┐
//!            ▼       │
//!      ┌──────────────┐  connect() Ok → LinkConnected  ┌───────────┐
//!      │ disconnected │ ─────────────────────────────► │ connected │
//!      └──────────────┘ ◄───────────────────────────── └───────────┘
//!                          is_connected() false → LinkLost   │  ▲
//!                                                            └──┘ sleep(check_interval)
//! ```
//!
//! The watchdog owns the [`LinkWriter`]; no other task can change "link up".
//! Retry and check delays are fixed.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::network::{Credentials, NetworkLink};
use crate::state::LinkWriter;
use crate::tasks::{Task, pause};

/// Keeps the network link up.
pub struct Watchdog {
    link: Box<dyn NetworkLink>,
    creds: Credentials,
    state: LinkWriter,
    connect_retry: Duration,
    check_interval: Duration,
    bus: Bus,
}

impl Watchdog {
    pub fn new(
        link: Box<dyn NetworkLink>,
        creds: Credentials,
        state: LinkWriter,
        connect_retry: Duration,
        check_interval: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            link,
            creds,
            state,
            connect_retry,
            check_interval,
            bus,
        }
    }

    async fn announce_connected(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let addr = or_cancel(ctx, self.link.local_address())
            .await?
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".into());
        self.state.set(true);
        self.bus
            .publish(Event::new(EventKind::LinkConnected).with_message(addr));
        Ok(())
    }
}

/// Awaits a link query unless `ctx` fires first.
async fn or_cancel<T>(
    ctx: &CancellationToken,
    query: impl Future<Output = T>,
) -> Result<T, TaskError> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(TaskError::Canceled),
        out = query => Ok(out),
    }
}

#[async_trait]
impl Task for Watchdog {
    fn name(&self) -> &str {
        "watchdog"
    }

    async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut up = or_cancel(&ctx, self.link.is_connected()).await?;
        if up {
            self.announce_connected(&ctx).await?;
        }

        loop {
            if up {
                pause(&ctx, self.check_interval).await?;
                if !or_cancel(&ctx, self.link.is_connected()).await? {
                    up = false;
                    self.state.set(false);
                    self.bus.publish(Event::new(EventKind::LinkLost));
                }
                continue;
            }

            match or_cancel(&ctx, self.link.connect(&self.creds)).await? {
                Ok(()) => {
                    up = true;
                    self.announce_connected(&ctx).await?;
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::LinkConnectFailed)
                            .with_delay(self.connect_retry)
                            .with_message(e.to_string()),
                    );
                    pause(&ctx, self.connect_retry).await?;
                }
            }
        }
    }
}
