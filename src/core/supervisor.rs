//! # Supervisor: runs the agent tasks, fans out diagnostics, stops on signal.
//!
//! The [`Supervisor`] owns the event bus and the subscriber list. It spawns
//! every agent task on one shared cancellation tree, forwards bus traffic to
//! the [`SubscriberSet`] and decides when the process is over.
//!
//! ## Outcomes
//! - a task returns `Err(TaskError::Canceled)`: normal stop, nothing to report
//! - a task returns `Ok(())`: published as [`EventKind::TaskExited`]; the
//!   remaining tasks keep running
//! - a task returns any other error or panics: published as
//!   [`EventKind::TaskDied`], every task is cancelled and `run` fails with
//!   [`RuntimeError::TaskDied`]
//! - a termination signal arrives: [`EventKind::ShutdownRequested`], every task
//!   is cancelled and given [`AgentConfig::grace`](crate::AgentConfig::grace)
//!   to stop
//!
//! ## High-level architecture
//! ```text
//! Supervisor::run(tasks)
//!   ├─ SubscriberSet::new(subscribers)
//!   ├─ subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!   ├─ for each TaskBox:
//!   │     publish(TaskStarting)
//!   │     set.spawn(catch_unwind(task.run(runtime_token.child_token())))
//!   └─ select:
//!        ├─ shutdown signal ─► publish(ShutdownRequested)
//!        │                     runtime_token.cancel()
//!        │                     wait_all_with_grace()
//!        │                        ├─ all joined ─► AllStoppedWithin
//!        │                        └─ timeout    ─► GraceExceeded { stuck }
//!        └─ watch_tasks() ─► first fatal outcome ─► TaskDied, cancel, wait
//! ```
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use envirovisor::{Bus, Supervisor, TaskError, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sup = Supervisor::new(Duration::from_secs(1), Bus::new(64), Vec::new());
//!
//!     let ticker = TaskFn::boxed("ticker", |ctx: CancellationToken| async move {
//!         ctx.cancelled().await;
//!         Err(TaskError::Canceled)
//!     });
//!
//!     let res = sup
//!         .run_until(vec![ticker], tokio::time::sleep(Duration::from_millis(10)))
//!         .await;
//!     assert!(res.is_ok());
//! }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::shutdown;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet, panic_message};
use crate::tasks::TaskBox;

/// What a spawned task left behind: its name and either its own result or a
/// panic message.
type Outcome = (String, Result<Result<(), TaskError>, String>);

/// Coordinates agent tasks, event delivery and graceful shutdown.
pub struct Supervisor {
    grace: Duration,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Supervisor {
    /// Creates a supervisor publishing on `bus`.
    ///
    /// Subscribers start receiving events once [`run`](Supervisor::run) is
    /// called; anything published earlier is dropped.
    pub fn new(grace: Duration, bus: Bus, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            grace,
            bus,
            subscribers,
        }
    }

    /// Bus shared with every task.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runs `tasks` until one of them dies or the process receives a
    /// termination signal.
    pub async fn run(self, tasks: Vec<TaskBox>) -> Result<(), RuntimeError> {
        let signal = async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(name) => info!(signal = name, "termination signal received"),
                Err(e) => {
                    warn!(error = %e, "signal handlers unavailable, running until a task dies");
                    std::future::pending::<()>().await;
                }
            }
        };
        self.run_until(tasks, signal).await
    }

    /// Same as [`run`](Supervisor::run), with `shutdown` standing in for the
    /// termination signal.
    pub async fn run_until<F>(self, tasks: Vec<TaskBox>, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let token = CancellationToken::new();
        let listener_done = CancellationToken::new();
        let listener = self.subscriber_listener(listener_done.clone());

        let mut set = JoinSet::new();
        let mut running = self.spawn_tasks(&mut set, &token, tasks);
        let res = self
            .drive_shutdown(&mut set, &mut running, &token, shutdown)
            .await;

        listener_done.cancel();
        let _ = listener.await;
        res
    }

    /// Forwards bus events to the subscriber set until `done` fires, then
    /// drains what is already queued and waits for the subscribers.
    fn subscriber_listener(&self, done: CancellationToken) -> tokio::task::JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                    _ = done.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        })
    }

    /// Spawns every task on a child of `runtime_token`; returns their names.
    fn spawn_tasks(
        &self,
        set: &mut JoinSet<Outcome>,
        runtime_token: &CancellationToken,
        tasks: Vec<TaskBox>,
    ) -> Vec<String> {
        let mut names = Vec::with_capacity(tasks.len());
        for task in tasks {
            let name = task.name().to_string();
            self.bus
                .publish(Event::new(EventKind::TaskStarting).with_task(name.as_str()));
            names.push(name.clone());

            let child = runtime_token.child_token();
            set.spawn(async move {
                let res = AssertUnwindSafe(task.run(child))
                    .catch_unwind()
                    .await
                    .map_err(|p| panic_message(&*p));
                (name, res)
            });
        }
        names
    }

    /// Waits for either the shutdown trigger or the first fatal task outcome.
    async fn drive_shutdown<F>(
        &self,
        set: &mut JoinSet<Outcome>,
        running: &mut Vec<String>,
        runtime_token: &CancellationToken,
        shutdown: F,
    ) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let died = tokio::select! {
            _ = shutdown => None,
            died = self.watch_tasks(set, running) => Some(died),
        };

        match died {
            None => {
                self.bus.publish(Event::new(EventKind::ShutdownRequested));
                runtime_token.cancel();
                self.wait_all_with_grace(set, running).await
            }
            Some(None) => Ok(()),
            Some(Some(err)) => {
                runtime_token.cancel();
                let _ = self.wait_all_with_grace(set, running).await;
                Err(err)
            }
        }
    }

    /// Joins tasks as they finish; returns the first fatal outcome, or `None`
    /// once every task is gone.
    async fn watch_tasks(
        &self,
        set: &mut JoinSet<Outcome>,
        running: &mut Vec<String>,
    ) -> Option<RuntimeError> {
        while let Some(joined) = set.join_next().await {
            let (task, res) = match joined {
                Ok(outcome) => outcome,
                Err(e) => (String::from("unknown"), Err(e.to_string())),
            };
            running.retain(|n| *n != task);

            let reason = match res {
                Ok(Ok(())) => {
                    self.bus
                        .publish(Event::new(EventKind::TaskExited).with_task(task.as_str()));
                    continue;
                }
                Ok(Err(TaskError::Canceled)) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {panic}"),
            };

            self.bus.publish(
                Event::new(EventKind::TaskDied)
                    .with_task(task.as_str())
                    .with_message(reason.as_str()),
            );
            return Some(RuntimeError::TaskDied { task, reason });
        }
        None
    }

    /// Waits for all tasks to finish within the grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the tasks still running.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<Outcome>,
        running: &mut Vec<String>,
    ) -> Result<(), RuntimeError> {
        let grace = self.grace;
        let done = async {
            while let Some(joined) = set.join_next().await {
                if let Ok((name, _)) = joined {
                    running.retain(|n| *n != name);
                }
            }
        };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = std::mem::take(running);
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_message(stuck.join(", ")),
                );
                set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, ev: &Event) {
            self.0.lock().unwrap().push(ev.clone());
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    impl Collect {
        fn kinds(&self) -> Vec<EventKind> {
            self.0.lock().unwrap().iter().map(|e| e.kind).collect()
        }
    }

    fn supervisor(collect: &Arc<Collect>) -> Supervisor {
        Supervisor::new(Duration::from_secs(5), Bus::new(256), vec![collect.clone()])
    }

    fn until_cancelled(name: &'static str) -> TaskBox {
        TaskFn::boxed(name, |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_task_stops_everything() {
        let collect = Arc::new(Collect::default());
        let doomed = TaskFn::boxed("dispatcher", |_ctx: CancellationToken| async move {
            Err(TaskError::Fatal {
                error: "no session".into(),
            })
        });

        let res = supervisor(&collect)
            .run_until(
                vec![until_cancelled("watchdog"), doomed],
                std::future::pending(),
            )
            .await;

        match res {
            Err(RuntimeError::TaskDied { task, reason }) => {
                assert_eq!(task, "dispatcher");
                assert!(reason.contains("no session"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
        let kinds = collect.kinds();
        assert!(kinds.contains(&EventKind::TaskDied));
        assert!(kinds.contains(&EventKind::AllStoppedWithin));
    }

    #[tokio::test(start_paused = true)]
    async fn panic_is_reported_as_death() {
        let collect = Arc::new(Collect::default());
        let boom = TaskFn::boxed("display", |_ctx: CancellationToken| async move {
            if true {
                panic!("framebuffer gone");
            }
            Ok(())
        });

        let res = supervisor(&collect)
            .run_until(vec![boom], std::future::pending())
            .await;

        match res {
            Err(RuntimeError::TaskDied { task, reason }) => {
                assert_eq!(task, "display");
                assert!(reason.contains("framebuffer gone"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_exit_leaves_others_running() {
        let collect = Arc::new(Collect::default());
        let quits = TaskFn::boxed("scd4x", |_ctx: CancellationToken| async move { Ok(()) });

        let res = supervisor(&collect)
            .run_until(
                vec![quits, until_cancelled("bme680")],
                tokio::time::sleep(Duration::from_secs(30)),
            )
            .await;

        assert!(res.is_ok());
        let kinds = collect.kinds();
        let exited = kinds.iter().position(|k| *k == EventKind::TaskExited);
        let shutdown = kinds.iter().position(|k| *k == EventKind::ShutdownRequested);
        assert!(exited.is_some() && exited < shutdown, "{kinds:?}");
        assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithin));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_exceeds_grace() {
        let collect = Arc::new(Collect::default());
        let stubborn = TaskFn::boxed("stubborn", |_ctx: CancellationToken| async move {
            std::future::pending::<()>().await;
            Ok(())
        });

        let res = supervisor(&collect)
            .run_until(
                vec![stubborn, until_cancelled("watchdog")],
                std::future::ready(()),
            )
            .await;

        match res {
            Err(RuntimeError::GraceExceeded { grace, stuck }) => {
                assert_eq!(grace, Duration::from_secs(5));
                assert_eq!(stuck, vec!["stubborn".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(collect.kinds().contains(&EventKind::GraceExceeded));
    }
}
