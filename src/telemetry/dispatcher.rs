//! # Telemetry dispatcher.
//!
//! ```text
//! poll_until(gate open)            (every gate_poll)
//! connect()                        (one session for the process lifetime)
//! loop:
//!   for channel in store.snapshot()        (declaration order)
//!     absent              → skip silently
//!     stale / non-finite  → PointSkipped
//!     POST line           → 204: PointSent | other: PointRejected | error: PointFailed
//!   ResourceReport                          (if a probe is installed)
//!   sleep(send_interval)
//! ```
//!
//! Points are sent one at a time; a failed point is dropped and the next batch
//! sends whatever the channel holds by then.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{AgentConfig, GatePolicy};
use crate::error::{TaskError, TransportError};
use crate::events::{Bus, Event, EventKind};
use crate::state::{ClockReader, LinkReader, ReadingStore, poll_until};
use crate::tasks::{Task, pause};
use crate::telemetry::{LinePoint, ResourceProbe, Transport};

/// Opens the store session once the gate is open.
pub type Connect = Box<dyn FnOnce() -> Result<Box<dyn Transport>, TransportError> + Send + Sync>;

/// Dispatcher knobs.
#[derive(Clone, Debug)]
pub struct DispatchSettings {
    /// `location` tag value, already sanitized.
    pub location: String,
    pub send_interval: Duration,
    pub gate: GatePolicy,
    pub gate_poll: Duration,
    /// Channels older than this are skipped (`None` = never).
    pub stale_after: Option<Duration>,
}

impl DispatchSettings {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            location: cfg.dispatch.location(),
            send_interval: cfg.dispatch.send_interval(),
            gate: cfg.dispatch.gate,
            gate_poll: cfg.gate_poll(),
            stale_after: cfg.dispatch.stale_after(),
        }
    }
}

/// Pushes the reading store to the remote store on a fixed cadence.
pub struct Dispatcher {
    settings: DispatchSettings,
    store: ReadingStore,
    link: LinkReader,
    clock: ClockReader,
    connect: Option<Connect>,
    probe: Option<Box<dyn ResourceProbe>>,
    bus: Bus,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        store: ReadingStore,
        link: LinkReader,
        clock: ClockReader,
        connect: Connect,
        bus: Bus,
    ) -> Self {
        Self {
            settings,
            store,
            link,
            clock,
            connect: Some(connect),
            probe: None,
            bus,
        }
    }

    /// Installs the probe reported after every batch.
    pub fn with_probe(mut self, probe: Box<dyn ResourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Sends every present channel once. Returns the number of POSTs issued.
    async fn send_batch(
        &self,
        transport: &dyn Transport,
        ctx: &CancellationToken,
    ) -> Result<usize, TaskError> {
        let mut posts = 0;

        for ch in self.store.snapshot() {
            let Some(value) = ch.value else {
                continue;
            };
            if let (Some(limit), Some(age)) = (self.settings.stale_after, ch.age) {
                if age > limit {
                    self.bus.publish(
                        Event::new(EventKind::PointSkipped)
                            .with_channel(ch.id.clone())
                            .with_value(value)
                            .with_message(format!("stale for {}s", age.as_secs())),
                    );
                    continue;
                }
            }

            let point = LinePoint::new(ch.spec.measurement)
                .tag("device", ch.spec.sensor)
                .tag("location", self.settings.location.as_str())
                .field("value", value);
            let line = match point.encode() {
                Ok(line) => line,
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::PointSkipped)
                            .with_channel(ch.id.clone())
                            .with_message(e.to_string()),
                    );
                    continue;
                }
            };

            posts += 1;
            let res = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                res = transport.post(&line) => res,
            };

            let ev = match res {
                Ok(resp) if resp.is_ingested() => Event::new(EventKind::PointSent)
                    .with_value(value)
                    .with_status(resp.status),
                Ok(resp) => Event::new(EventKind::PointRejected)
                    .with_status(resp.status)
                    .with_message(resp.body),
                Err(e) => Event::new(EventKind::PointFailed).with_message(e.to_string()),
            };
            self.bus.publish(ev.with_channel(ch.id));
        }
        Ok(posts)
    }

    async fn report_resources(&self) {
        let Some(probe) = &self.probe else {
            return;
        };
        let message = match probe.sample().await {
            Ok(report) => report.to_string(),
            Err(e) => format!("unavailable: {e}"),
        };
        self.bus
            .publish(Event::new(EventKind::ResourceReport).with_message(message));
    }
}

#[async_trait]
impl Task for Dispatcher {
    fn name(&self) -> &str {
        "dispatcher"
    }

    async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut this = self;

        let (gate, link, clock) = (this.settings.gate, &this.link, &this.clock);
        poll_until(&ctx, this.settings.gate_poll, || {
            gate.is_open(link.is_up(), clock.is_trusted())
        })
        .await?;

        let connect = this.connect.take().ok_or_else(|| TaskError::Fatal {
            error: "store session already opened".into(),
        })?;
        let transport = connect().map_err(|e| TaskError::Fatal {
            error: format!("cannot open store session: {e}"),
        })?;

        loop {
            this.send_batch(transport.as_ref(), &ctx).await?;
            this.report_resources().await;
            pause(&ctx, this.settings.send_interval).await?;
        }
    }
}
