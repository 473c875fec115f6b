//! Runtime core: assembly and supervision.
//!
//! - [`builder`]: turns an [`AgentConfig`](crate::AgentConfig) into tasks;
//! - [`supervisor`]: runs the tasks, handles shutdown and fatal errors;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod shutdown;
mod supervisor;

pub use builder::{Agent, AgentBuilder, Collaborators};
pub use supervisor::Supervisor;
