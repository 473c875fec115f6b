//! # Network connectivity.
//!
//! - [`NetworkLink`] link capability (connect, status, address)
//! - [`NmcliLink`] NetworkManager implementation
//! - [`Watchdog`] the task that keeps the link up and owns "link up"

mod link;
mod nmcli;
mod watchdog;

pub use link::{Credentials, NetworkLink};
pub use nmcli::NmcliLink;
pub use watchdog::Watchdog;
