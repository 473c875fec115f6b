//! # Shared agent state.
//!
//! Explicit state container injected into each task at construction:
//! - [`ReadingStore`] latest value per channel (one [`ChannelWriter`] per sensor)
//! - [`LinkWriter`] / [`LinkReader`] the "link up" fact
//! - [`ClockWriter`] / [`ClockReader`] the "clock trustworthy" fact
//!
//! All access goes through accessor methods; no task reaches into another
//! task's state directly.

mod flags;
mod readings;

pub use flags::{
    ClockReader, ClockSync, ClockWriter, LinkReader, LinkWriter, clock_state, link_state,
    poll_until,
};
pub use readings::{ChannelSnapshot, ChannelSpec, ChannelWriter, ReadingStore};
