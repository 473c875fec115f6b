//! # Task abstractions.
//!
//! This module provides the core task-related types:
//! - [`Task`] - trait for implementing long-lived, cancelable agent tasks
//! - [`TaskFn`] - closure-backed task implementation
//! - [`TaskBox`] - owned, type-erased task (`Box<dyn Task>`)
//! - [`pause`] - cancellation-aware sleep used at every suspension point

mod task;
mod task_fn;

pub use task::{Task, TaskBox, pause};
pub use task_fn::TaskFn;
