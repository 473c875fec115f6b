//! # NetworkManager-backed link.
//!
//! | operation       | command                                              |
//! |-----------------|------------------------------------------------------|
//! | `connect`       | `nmcli device wifi connect <ssid> password <psk> [ifname <if>]` |
//! | `is_connected`  | `nmcli -t -f STATE general`                          |
//! | `local_address` | `hostname -I`                                        |
//!
//! Every command is killed if it has not exited within the command timeout
//! (30 s unless set with [`NmcliLink::with_timeout`]).

use std::net::IpAddr;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::LinkError;
use crate::network::{Credentials, NetworkLink};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Link driven through the `nmcli` command line tool.
#[derive(Clone, Debug)]
pub struct NmcliLink {
    interface: Option<String>,
    timeout: Duration,
}

impl Default for NmcliLink {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NmcliLink {
    pub fn new(interface: Option<String>) -> Self {
        Self {
            interface,
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Bounds how long any single command may run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn output(&self, program: &str, args: &[&str]) -> Result<Output, LinkError> {
        let run = Command::new(program).args(args).kill_on_drop(true).output();
        match tokio::time::timeout(self.timeout, run).await {
            Ok(res) => res.map_err(|e| LinkError::Control(format!("{program}: {e}"))),
            Err(_) => Err(LinkError::Control(format!(
                "{program}: no exit within {}s",
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

#[async_trait]
impl NetworkLink for NmcliLink {
    async fn connect(&self, creds: &Credentials) -> Result<(), LinkError> {
        let mut args = vec![
            "device",
            "wifi",
            "connect",
            creds.ssid.as_str(),
            "password",
            creds.psk.as_str(),
        ];
        if let Some(iface) = &self.interface {
            args.extend(["ifname", iface.as_str()]);
        }

        let out = self.output("nmcli", &args).await?;
        if out.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        let stdout = String::from_utf8_lossy(&out.stdout);
        let reason = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(LinkError::Connect(reason))
    }

    async fn is_connected(&self) -> bool {
        match self.output("nmcli", &["-t", "-f", "STATE", "general"]).await {
            Ok(out) if out.status.success() => {
                parse_state(&String::from_utf8_lossy(&out.stdout))
            }
            _ => false,
        }
    }

    async fn local_address(&self) -> Option<IpAddr> {
        let out = self.output("hostname", &["-I"]).await.ok()?;
        parse_first_address(&String::from_utf8_lossy(&out.stdout))
    }
}

/// `connected`, `connected (site only)` and `connected (local only)` all mean
/// an association exists.
fn parse_state(stdout: &str) -> bool {
    stdout.trim().starts_with("connected")
}

fn parse_first_address(stdout: &str) -> Option<IpAddr> {
    stdout.split_whitespace().find_map(|tok| tok.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_output() {
        assert!(parse_state("connected\n"));
        assert!(parse_state("connected (local only)\n"));
        assert!(!parse_state("disconnected\n"));
        assert!(!parse_state("connecting\n"));
        assert!(!parse_state(""));
    }

    #[test]
    fn first_address_wins() {
        assert_eq!(
            parse_first_address("192.168.1.40 fd00::1 \n"),
            Some("192.168.1.40".parse().unwrap())
        );
        assert_eq!(parse_first_address("\n"), None);
    }

    #[tokio::test]
    async fn slow_command_is_killed_at_timeout() {
        let link = NmcliLink::new(None).with_timeout(Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = link.output("sleep", &["5"]).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(err.to_string().contains("no exit within 0.1s"), "{err}");
    }

    #[test]
    fn credentials_debug_hides_psk() {
        let creds = Credentials {
            ssid: "greenhouse".into(),
            psk: "hunter22".into(),
        };
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("greenhouse"));
        assert!(!dbg.contains("hunter22"));
    }
}
