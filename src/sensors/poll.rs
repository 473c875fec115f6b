//! # Generic sensor poll task.
//!
//! One instance per enabled sensor.
//!
//! ```text
//! loop:
//!   driver.read()
//!     ├─ Ok(reading) → writer.publish(reading) → SensorRead
//!     └─ Err(e)      → SensorFailed{delay} → sleep(backoff.delay_for(e))
//!   sleep(interval)
//! ```
//!
//! A failing driver never ends the task: there is no retry limit, the backoff
//! is fixed and the loop keeps polling until shutdown.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::FaultBackoff;
use crate::sensors::SensorDriver;
use crate::state::ChannelWriter;
use crate::tasks::{Task, pause};

/// Poll loop for one sensor.
pub struct PollTask<D> {
    driver: D,
    writer: ChannelWriter,
    interval: Duration,
    backoff: FaultBackoff,
    bus: Bus,
}

impl<D: SensorDriver> PollTask<D> {
    pub fn new(
        driver: D,
        writer: ChannelWriter,
        interval: Duration,
        backoff: FaultBackoff,
        bus: Bus,
    ) -> Self {
        Self {
            driver,
            writer,
            interval,
            backoff,
            bus,
        }
    }

    /// One read-publish (or read-classify-backoff) cycle, without the interval sleep.
    async fn cycle(&mut self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let sensor = self.writer.sensor();
        let res = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(TaskError::Canceled),
            res = self.driver.read() => res,
        };

        match res {
            Ok(reading) => {
                self.writer.publish(&reading);
                self.bus.publish(
                    Event::new(EventKind::SensorRead)
                        .with_task(sensor)
                        .with_message(reading.to_string()),
                );
                Ok(())
            }
            Err(err) => {
                let delay = self.backoff.delay_for(&err);
                self.bus.publish(
                    Event::new(EventKind::SensorFailed)
                        .with_task(sensor)
                        .with_delay(delay)
                        .with_message(err.to_string()),
                );
                pause(ctx, delay).await
            }
        }
    }
}

#[async_trait]
impl<D: SensorDriver> Task for PollTask<D> {
    fn name(&self) -> &str {
        self.writer.sensor()
    }

    async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut this = self;
        loop {
            this.cycle(&ctx).await?;
            pause(&ctx, this.interval).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::SensorError;
    use crate::sensors::Reading;
    use crate::state::{ChannelSpec, ReadingStore};

    /// Replays a script, then keeps returning the last entry.
    struct Scripted {
        script: VecDeque<Result<Reading, SensorError>>,
        last: Result<Reading, SensorError>,
        reads: Arc<AtomicU32>,
    }

    impl Scripted {
        fn new(script: Vec<Result<Reading, SensorError>>, reads: Arc<AtomicU32>) -> Self {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| Err(SensorError::Other("empty".into())));
            Self {
                script: script.into(),
                last,
                reads,
            }
        }
    }

    #[async_trait]
    impl SensorDriver for Scripted {
        async fn read(&mut self) -> Result<Reading, SensorError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.script.pop_front().unwrap_or_else(|| self.last.clone())
        }
    }

    fn store() -> ReadingStore {
        ReadingStore::new([ChannelSpec::new("scd4x", "co2", "co2")])
    }

    fn backoff() -> FaultBackoff {
        FaultBackoff {
            io: Duration::from_secs(10),
            runtime: Duration::from_secs(5),
            unclassified: Duration::from_secs(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn faults_never_end_the_task() {
        let reads = Arc::new(AtomicU32::new(0));
        let store = store();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let driver = Scripted::new(vec![Err(SensorError::Io("nack".into()))], reads.clone());
        let task = PollTask::new(
            driver,
            store.claim("scd4x").unwrap(),
            Duration::from_secs(5),
            backoff(),
            bus,
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(Box::new(task).run(ctx.clone()));

        // Each io fault costs 10s backoff + 5s interval: reads at 0, 15, 30, 45.
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 4);
        assert!(!handle.is_finished());
        assert_eq!(store.get("scd4x.co2"), None);

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SensorFailed);
        assert_eq!(ev.task.as_deref(), Some("scd4x"));
        assert_eq!(ev.delay_ms, Some(10_000));

        ctx.cancel();
        let res = handle.await.unwrap();
        assert!(matches!(res, Err(TaskError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn success_publishes_then_waits_interval() {
        let reads = Arc::new(AtomicU32::new(0));
        let store = store();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let driver = Scripted::new(
            vec![
                Err(SensorError::Runtime("crc".into())),
                Ok(Reading::new().with("co2", 412.0)),
            ],
            reads.clone(),
        );
        let task = PollTask::new(
            driver,
            store.claim("scd4x").unwrap(),
            Duration::from_secs(5),
            backoff(),
            bus,
        );
        let ctx = CancellationToken::new();
        let handle = tokio::spawn(Box::new(task).run(ctx.clone()));

        // runtime fault at 0 (5s backoff + 5s interval), success at 10, 15, 20.
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(store.get("scd4x.co2"), Some(412.0));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 4);

        assert_eq!(rx.recv().await.unwrap().delay_ms, Some(5_000));
        let ok = rx.recv().await.unwrap();
        assert_eq!(ok.kind, EventKind::SensorRead);
        assert_eq!(ok.message.as_deref(), Some("co2=412"));

        ctx.cancel();
        let _ = handle.await;
    }
}
