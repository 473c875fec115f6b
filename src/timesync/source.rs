//! Network time source capability.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::TimeError;

/// Returns the current civil time in the offset the source was built with.
#[async_trait]
pub trait TimeSource: Send + 'static {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeError>;
}

/// Builds the time source once the link is up.
pub type MakeTimeSource = Box<dyn FnOnce(FixedOffset) -> Box<dyn TimeSource> + Send + Sync>;

#[async_trait]
impl TimeSource for Box<dyn TimeSource> {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeError> {
        (**self).now().await
    }
}
