//! Network link capability consumed by the watchdog.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::LinkError;

/// Access point credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub psk: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("psk", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait NetworkLink: Send + Sync + 'static {
    /// Associates with the access point.
    async fn connect(&self, creds: &Credentials) -> Result<(), LinkError>;

    /// `true` while the link has an active association.
    async fn is_connected(&self) -> bool;

    /// Address assigned to the device, if any.
    async fn local_address(&self) -> Option<IpAddr>;
}
