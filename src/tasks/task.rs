//! # Task abstraction.
//!
//! This module defines the [`Task`] trait (async, cancelable) and the owned handle
//! type [`TaskBox`] the supervisor spawns.
//!
//! Agent tasks run forever and are never restarted, so `run` consumes the task:
//! whatever state it owns (a driver, a transport session) moves into the future.
//! A task receives a [`CancellationToken`] and should select on it around every
//! sleep to stop cooperatively during shutdown.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Owned, type-erased task.
pub type TaskBox = Box<dyn Task>;

/// # Asynchronous, cancelable unit.
///
/// A `Task` has a stable [`name`](Task::name) and an async [`run`](Task::run) method that receives a [`CancellationToken`].
///
/// Tasks return `Err(TaskError::Canceled)` once they observe cancellation; the
/// supervisor treats that as a graceful stop. Returning `Ok(())` is unexpected
/// for agent tasks and is reported; any other `Err` is fatal for the process.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use envirovisor::{Task, TaskError};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Task for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError> {
///         loop {
///             tokio::select! {
///                 _ = ctx.cancelled() => return Err(TaskError::Canceled),
///                 _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task until cancellation (or a fatal error).
    async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError>;
}

/// Sleeps for `dur` unless `ctx` is cancelled first.
pub async fn pause(ctx: &CancellationToken, dur: Duration) -> Result<(), TaskError> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(TaskError::Canceled),
        _ = tokio::time::sleep(dur) => Ok(()),
    }
}
