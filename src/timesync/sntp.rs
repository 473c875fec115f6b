//! # SNTP client (RFC 4330).
//!
//! Sends one 48-byte client request over UDP and reads the server's transmit
//! timestamp. The result is converted to the configured fixed offset.
//!
//! ```text
//! byte 0      LI(2) VN(3) Mode(3)      request: 0b00_100_011 (v4, client)
//! byte 1      stratum                  0 in a reply = kiss-o'-death
//! bytes 40-47 transmit timestamp       seconds since 1900 + 2^-32 fraction
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio::net::UdpSocket;

use crate::error::TimeError;
use crate::timesync::TimeSource;

/// Seconds between 1900-01-01 and 1970-01-01.
const NTP_UNIX_DELTA: i64 = 2_208_988_800;
const PACKET_LEN: usize = 48;

/// Network time client bound to one server and offset.
#[derive(Clone, Debug)]
pub struct SntpClient {
    server: String,
    offset: FixedOffset,
    timeout: Duration,
}

impl SntpClient {
    pub fn new(server: impl Into<String>, offset: FixedOffset, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            offset,
            timeout,
        }
    }

    async fn exchange(&self) -> Result<[u8; PACKET_LEN], TimeError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&self.server).await?;
        socket.send(&request_packet()).await?;

        let mut buf = [0u8; PACKET_LEN];
        let n = tokio::time::timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| TimeError::Timeout(self.timeout))??;
        if n < PACKET_LEN {
            return Err(TimeError::InvalidResponse(format!(
                "short packet: {n} bytes"
            )));
        }
        Ok(buf)
    }
}

#[async_trait]
impl TimeSource for SntpClient {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeError> {
        let buf = self.exchange().await?;
        Ok(decode_reply(&buf)?.with_timezone(&self.offset))
    }
}

fn request_packet() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = 0b00_100_011;
    packet
}

/// RFC 4330 section 3: with the top bit set the count is 1968..2036 from the
/// 1900 epoch; with it clear the count has wrapped into era 1 (2036..2104).
fn unix_seconds(ntp: u32) -> i64 {
    let secs = if ntp & 0x8000_0000 != 0 {
        i64::from(ntp)
    } else {
        i64::from(ntp) + (1_i64 << 32)
    };
    secs - NTP_UNIX_DELTA
}

fn decode_reply(buf: &[u8; PACKET_LEN]) -> Result<DateTime<Utc>, TimeError> {
    let mode = buf[0] & 0b111;
    if mode != 4 {
        return Err(TimeError::InvalidResponse(format!("unexpected mode {mode}")));
    }
    if buf[1] == 0 {
        let code = String::from_utf8_lossy(&buf[12..16]).into_owned();
        return Err(TimeError::InvalidResponse(format!("kiss-o'-death {code}")));
    }

    let secs = u32::from_be_bytes([buf[40], buf[41], buf[42], buf[43]]);
    let frac = u32::from_be_bytes([buf[44], buf[45], buf[46], buf[47]]);
    if secs == 0 && frac == 0 {
        return Err(TimeError::InvalidResponse("empty transmit timestamp".into()));
    }

    let nanos = ((u64::from(frac) * 1_000_000_000) >> 32) as u32;
    DateTime::from_timestamp(unix_seconds(secs), nanos)
        .ok_or_else(|| TimeError::InvalidResponse(format!("timestamp {secs} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(secs: u32, frac: u32) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[0] = 0b00_100_100;
        buf[1] = 2;
        buf[40..44].copy_from_slice(&secs.to_be_bytes());
        buf[44..48].copy_from_slice(&frac.to_be_bytes());
        buf
    }

    #[test]
    fn request_is_v4_client() {
        let p = request_packet();
        assert_eq!((p[0] >> 3) & 0b111, 4);
        assert_eq!(p[0] & 0b111, 3);
        assert!(p[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn decodes_transmit_timestamp() {
        // 2024-05-01T18:00:00Z, half a second.
        let unix = 1_714_586_400_i64;
        let t = decode_reply(&reply((unix + NTP_UNIX_DELTA) as u32, 1 << 31)).unwrap();
        assert_eq!(t.timestamp(), unix);
        assert_eq!(t.timestamp_subsec_millis(), 500);

        let local = t.with_timezone(&FixedOffset::east_opt(-8 * 3600).unwrap());
        assert_eq!(local.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-05-01 10:00:00");
    }

    #[test]
    fn era_rolls_over_in_2036() {
        // last second of era 0
        assert_eq!(unix_seconds(u32::MAX), 2_085_978_495);
        // 2036-02-07T06:28:16Z starts era 1
        assert_eq!(unix_seconds(0), 2_085_978_496);

        // 2040-01-01T00:00:00Z
        let unix = 2_208_988_800_i64;
        let wrapped = (unix + NTP_UNIX_DELTA - (1_i64 << 32)) as u32;
        let t = decode_reply(&reply(wrapped, 0)).unwrap();
        assert_eq!(t.timestamp(), unix);
        assert_eq!(t.format("%Y-%m-%d").to_string(), "2040-01-01");
    }

    #[test]
    fn rejects_kiss_of_death_and_wrong_mode() {
        let mut kod = reply(3_900_000_000, 0);
        kod[1] = 0;
        kod[12..16].copy_from_slice(b"RATE");
        let err = decode_reply(&kod).unwrap_err();
        assert!(err.to_string().contains("RATE"));

        let mut client = reply(3_900_000_000, 0);
        client[0] = 0b00_100_011;
        assert_eq!(decode_reply(&client).unwrap_err().as_label(), "time_invalid_response");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let mut client = SntpClient::new(
            addr.to_string(),
            FixedOffset::east_opt(0).unwrap(),
            Duration::from_millis(50),
        );
        let err = client.now().await.unwrap_err();
        assert_eq!(err.as_label(), "time_timeout");
    }
}
