//! # Remote metrics store transport.
//!
//! [`Transport`] posts one encoded point and reports the HTTP status. A status
//! other than 204 is a normal [`StoreResponse`], not an error: only failures
//! that prevent getting a status at all surface as [`TransportError`].
//!
//! [`InfluxTransport`] is the production implementation (InfluxDB v2 write API):
//!
//! ```text
//! POST <url>?org=<org>&bucket=<bucket>
//! Authorization: Token <token>
//! Content-Type: text/plain; charset=utf-8
//!
//! co2,device=scd4x,location=Lab value=412
//! ```

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::config::InfluxConfig;
use crate::error::TransportError;

/// Status and body returned by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: u16,
    pub body: String,
}

impl StoreResponse {
    /// `true` when the point was ingested.
    pub fn is_ingested(&self) -> bool {
        self.status == 204
    }
}

/// One persistent session with the store.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn post(&self, line: &str) -> Result<StoreResponse, TransportError>;
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn post(&self, line: &str) -> Result<StoreResponse, TransportError> {
        (**self).post(line).await
    }
}

/// HTTP(S) session to an InfluxDB v2 write endpoint.
pub struct InfluxTransport {
    client: reqwest::Client,
    url: reqwest::Url,
    authorization: String,
}

impl InfluxTransport {
    /// Builds the client (TLS settings, timeout) and the full write URL.
    pub fn new(cfg: &InfluxConfig) -> Result<Self, TransportError> {
        let mut url = reqwest::Url::parse(&cfg.url)
            .map_err(|e| TransportError::Endpoint(format!("{}: {e}", cfg.url)))?;
        url.query_pairs_mut()
            .append_pair("org", &cfg.org)
            .append_pair("bucket", &cfg.bucket);

        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .danger_accept_invalid_hostnames(!cfg.verify_hostname)
            .build()?;

        Ok(Self {
            client,
            url,
            authorization: format!("Token {}", cfg.token),
        })
    }

    /// Full write URL including the query string.
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }
}

#[async_trait]
impl Transport for InfluxTransport {
    async fn post(&self, line: &str) -> Result<StoreResponse, TransportError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(line.to_owned())
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = if status == 204 {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };
        Ok(StoreResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn influx(url: &str) -> InfluxConfig {
        InfluxConfig {
            url: url.into(),
            org: "home lab".into(),
            bucket: "env".into(),
            token: "t0k".into(),
            ..InfluxConfig::default()
        }
    }

    #[test]
    fn url_carries_org_and_bucket() {
        let t = InfluxTransport::new(&influx("https://influx.local:8086/api/v2/write")).unwrap();
        assert_eq!(
            t.url().as_str(),
            "https://influx.local:8086/api/v2/write?org=home+lab&bucket=env"
        );
        assert_eq!(t.authorization, "Token t0k");
    }

    #[test]
    fn bad_endpoint_is_reported() {
        let err = InfluxTransport::new(&influx("not a url")).err().unwrap();
        assert_eq!(err.as_label(), "transport_endpoint");
    }
}
