//! # Agent configuration.
//!
//! Provides [`AgentConfig`], the centralized settings for every task of the
//! agent, loaded once at startup from a TOML file.
//!
//! ```toml
//! [network]
//! ssid = "greenhouse"
//! psk = "hunter22"
//!
//! [influx]
//! url = "https://influx.example.net/api/v2/write"
//! org = "home"
//! bucket = "sensors"
//! token = "s3cr3t"
//!
//! [dispatch]
//! location = "Back Porch"     # sent as `location=Back-Porch`
//!
//! [sensors.bme680.source]
//! temperature = { path = "/sys/bus/iio/devices/iio:device0/in_temp_input", scale = 0.001 }
//! ```
//!
//! ## Sentinel values
//! - `dispatch.stale_after_secs` unset → channels never expire
//! - `sensors.<name>.interval_secs` unset → per-sensor default from the catalog
//!
//! All durations are stored as whole seconds; use the helper accessors instead of
//! converting at call sites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::policies::FaultBackoff;
use crate::sensors::SensorKind;

/// Top-level configuration for the agent.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Network credentials and watchdog cadence.
    pub network: NetworkConfig,
    /// Network time source and resync cadence.
    pub time: TimeConfig,
    /// Remote metrics store.
    pub influx: InfluxConfig,
    /// Dispatcher cadence, gating and tagging.
    pub dispatch: DispatchConfig,
    /// Per-sensor enable flags, cadences and driver source.
    pub sensors: SensorsConfig,
    /// Optional local display.
    pub display: DisplayConfig,
    /// Poll-task backoff per fault class.
    pub backoff: BackoffConfig,
    /// Interval for polling the link/clock predicates while gated.
    pub gate_poll_secs: u64,
    /// Maximum time to wait for tasks to stop after a shutdown signal.
    pub grace_secs: u64,
    /// Capacity of the diagnostic event bus ring buffer.
    pub bus_capacity: usize,
}

impl Default for AgentConfig {
    /// Defaults mirror the field-tested device settings:
    /// - `gate_poll = 1s`, `grace = 5s`, `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            time: TimeConfig::default(),
            influx: InfluxConfig::default(),
            dispatch: DispatchConfig::default(),
            sensors: SensorsConfig::default(),
            display: DisplayConfig::default(),
            backoff: BackoffConfig::default(),
            gate_poll_secs: 1,
            grace_secs: 5,
            bus_capacity: 1024,
        }
    }
}

impl AgentConfig {
    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: AgentConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects configurations the tasks cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_text("influx.url", &self.influx.url)?;
        require_text("influx.org", &self.influx.org)?;
        require_text("influx.bucket", &self.influx.bucket)?;
        require_text("influx.token", &self.influx.token)?;
        require_tag("dispatch.location", &self.dispatch.location)?;

        require_positive("gate_poll_secs", self.gate_poll_secs)?;
        require_positive("dispatch.send_interval_secs", self.dispatch.send_interval_secs)?;
        require_positive("time.resync_interval_secs", self.time.resync_interval_secs)?;
        require_positive("time.request_timeout_secs", self.time.request_timeout_secs)?;
        require_positive("network.connect_retry_secs", self.network.connect_retry_secs)?;
        require_positive("network.check_interval_secs", self.network.check_interval_secs)?;
        require_positive("display.update_interval_secs", self.display.update_interval_secs)?;

        for kind in SensorKind::ALL {
            if self.sensors.get(kind).interval_secs == Some(0) {
                return Err(ConfigError::Invalid {
                    field: "sensors.<name>.interval_secs",
                    reason: format!("{} poll interval must be positive", kind.name()),
                });
            }
        }

        if self.time.utc_offset().is_none() {
            return Err(ConfigError::Invalid {
                field: "time.utc_offset_hours",
                reason: format!("{} is outside -23..=23", self.time.utc_offset_hours),
            });
        }
        Ok(())
    }

    /// Predicate polling interval while a task waits for link or clock.
    #[inline]
    pub fn gate_poll(&self) -> Duration {
        Duration::from_secs(self.gate_poll_secs)
    }

    /// Graceful shutdown window.
    #[inline]
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

/// Line protocol cannot carry line breaks, and a trailing backslash would
/// escape the separator after the tag.
fn require_tag(field: &'static str, value: &str) -> Result<(), ConfigError> {
    require_text(field, value)?;
    if value.contains(['\n', '\r']) || value.ends_with('\\') {
        return Err(ConfigError::Invalid {
            field,
            reason: "must not contain line breaks or end with a backslash".into(),
        });
    }
    Ok(())
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

/// Network credentials and watchdog cadence.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Access point name.
    pub ssid: String,
    /// Access point passphrase.
    pub psk: String,
    /// Wireless interface handed to the link tooling (`None` = let it pick).
    pub interface: Option<String>,
    /// Delay after a failed connect attempt.
    pub connect_retry_secs: u64,
    /// Delay between connectivity re-checks while connected.
    pub check_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            psk: String::new(),
            interface: None,
            connect_retry_secs: 10,
            check_interval_secs: 60,
        }
    }
}

impl NetworkConfig {
    #[inline]
    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }

    #[inline]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Network time source and resync cadence.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// `host:port` of the SNTP server.
    pub server: String,
    /// Fixed offset from UTC applied to network time, in whole hours.
    pub utc_offset_hours: i32,
    /// Delay between sync attempts (after success or failure).
    pub resync_interval_secs: u64,
    /// How long to wait for a server answer.
    pub request_timeout_secs: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            server: "pool.ntp.org:123".into(),
            utc_offset_hours: -8,
            resync_interval_secs: 3600,
            request_timeout_secs: 5,
        }
    }
}

impl TimeConfig {
    /// Returns the configured offset, or `None` when out of range.
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
    }

    #[inline]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Remote metrics store (InfluxDB v2 write API).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Write endpoint, without query string.
    pub url: String,
    /// Organization, sent as `org=` query parameter.
    pub org: String,
    /// Bucket, sent as `bucket=` query parameter.
    pub bucket: String,
    /// Static credential for `Authorization: Token <token>`.
    pub token: String,
    /// Verify the TLS certificate hostname.
    pub verify_hostname: bool,
    /// Per-request transport timeout.
    pub request_timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            org: String::new(),
            bucket: String::new(),
            token: String::new(),
            verify_hostname: true,
            request_timeout_secs: 30,
        }
    }
}

impl InfluxConfig {
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which link/clock combination opens the dispatcher gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    /// Wait until the link is up **and** the clock is trusted.
    #[default]
    Both,
    /// Keep waiting only while the link is down **and** the clock is untrusted,
    /// i.e. either fact alone opens the gate.
    Legacy,
}

impl GatePolicy {
    /// `true` once the dispatcher may start sending.
    pub fn is_open(&self, link_up: bool, clock_trusted: bool) -> bool {
        match self {
            GatePolicy::Both => link_up && clock_trusted,
            GatePolicy::Legacy => link_up || clock_trusted,
        }
    }
}

/// Dispatcher cadence, gating and tagging.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Value of the `location` tag (spaces are replaced by dashes).
    pub location: String,
    /// Delay between batches.
    pub send_interval_secs: u64,
    /// Readiness gate semantics.
    pub gate: GatePolicy,
    /// Skip channels not updated for this long (`None` = never expire).
    pub stale_after_secs: Option<u64>,
    /// Emit a memory report after each batch.
    pub memory_monitoring: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            location: "Unknown".into(),
            send_interval_secs: 10,
            gate: GatePolicy::default(),
            stale_after_secs: None,
            memory_monitoring: false,
        }
    }
}

impl DispatchConfig {
    /// Location tag value with every space turned into a dash.
    ///
    /// Surrounding spaces are kept, so `"Lab "` is tagged `Lab-`.
    pub fn location(&self) -> String {
        self.location.replace(' ', "-")
    }

    #[inline]
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.send_interval_secs)
    }

    #[inline]
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }
}

/// One sysfs attribute feeding one reading field.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FieldSource {
    /// File holding the raw value as ASCII text.
    pub path: PathBuf,
    /// Multiplier applied to the raw value.
    #[serde(default = "unit_scale")]
    pub scale: f64,
    /// Added after scaling.
    #[serde(default)]
    pub offset: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// Per-sensor settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Start a poll task for this sensor.
    pub enabled: bool,
    /// Poll interval; `None` uses the catalog default.
    pub interval_secs: Option<u64>,
    /// Field name → sysfs source.
    pub source: BTreeMap<String, FieldSource>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: None,
            source: BTreeMap::new(),
        }
    }
}

/// Settings for every sensor of the catalog.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub radsens: SensorConfig,
    pub bme680: SensorConfig,
    pub scd4x: SensorConfig,
    pub pm25: SensorConfig,
    /// Sea-level reference for BME680 altitude derivation, in hPa.
    pub sea_level_pressure: f64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            radsens: SensorConfig::default(),
            bme680: SensorConfig::default(),
            scd4x: SensorConfig::default(),
            pm25: SensorConfig::default(),
            sea_level_pressure: 1013.25,
        }
    }
}

impl SensorsConfig {
    /// Settings for one catalog sensor.
    pub fn get(&self, kind: SensorKind) -> &SensorConfig {
        match kind {
            SensorKind::RadSens => &self.radsens,
            SensorKind::Bme680 => &self.bme680,
            SensorKind::Scd4x => &self.scd4x,
            SensorKind::Pm25 => &self.pm25,
        }
    }

    /// Effective poll interval for one sensor.
    pub fn interval(&self, kind: SensorKind) -> Duration {
        self.get(kind)
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| kind.default_interval())
    }

    /// Enabled sensors, in catalog (dispatch) order.
    pub fn enabled(&self) -> impl Iterator<Item = SensorKind> + '_ {
        SensorKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).enabled)
    }
}

/// Local display settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub enabled: bool,
    pub update_interval_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            update_interval_secs: 1,
        }
    }
}

impl DisplayConfig {
    #[inline]
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

/// Poll-task backoff per fault class, in seconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub io_secs: u64,
    pub runtime_secs: u64,
    pub unclassified_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            io_secs: 10,
            runtime_secs: 5,
            unclassified_secs: 10,
        }
    }
}

impl BackoffConfig {
    /// Classification table handed to every poll task.
    pub fn policy(&self) -> FaultBackoff {
        FaultBackoff {
            io: Duration::from_secs(self.io_secs),
            runtime: Duration::from_secs(self.runtime_secs),
            unclassified: Duration::from_secs(self.unclassified_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [influx]
        url = "https://influx.local/api/v2/write"
        org = "home"
        bucket = "env"
        token = "t0k"
    "#;

    #[test]
    fn minimal_file_gets_device_defaults() {
        let cfg = AgentConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.dispatch.send_interval(), Duration::from_secs(10));
        assert_eq!(cfg.time.resync_interval(), Duration::from_secs(3600));
        assert_eq!(cfg.time.utc_offset_hours, -8);
        assert_eq!(cfg.network.connect_retry(), Duration::from_secs(10));
        assert_eq!(cfg.network.check_interval(), Duration::from_secs(60));
        assert_eq!(cfg.dispatch.gate, GatePolicy::Both);
        assert!(cfg.influx.verify_hostname);
        assert!(!cfg.display.enabled);
        assert_eq!(cfg.sensors.enabled().count(), 4);
        assert_eq!(cfg.sensors.interval(SensorKind::Bme680), Duration::from_secs(1));
        assert_eq!(cfg.sensors.interval(SensorKind::Scd4x), Duration::from_secs(5));
    }

    #[test]
    fn location_spaces_become_dashes() {
        let mut cfg = DispatchConfig::default();
        cfg.location = "Back Porch East".into();
        assert_eq!(cfg.location(), "Back-Porch-East");
        cfg.location = "Lab ".into();
        assert_eq!(cfg.location(), "Lab-");
    }

    #[test]
    fn unencodable_locations_are_rejected() {
        for bad in ["", "   ", "Shed\nNorth", "Shed\r", "Shed\\"] {
            let raw = format!("{MINIMAL}\n[dispatch]\nlocation = {bad:?}\n");
            let err = AgentConfig::from_toml_str(&raw).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { field: "dispatch.location", .. }),
                "{bad:?}: {err:?}"
            );
        }
        let ok = format!("{MINIMAL}\n[dispatch]\nlocation = \"Shed, North=2\"\n");
        assert_eq!(
            AgentConfig::from_toml_str(&ok).unwrap().dispatch.location(),
            "Shed,-North=2"
        );
    }

    #[test]
    fn sensor_sections_override_defaults() {
        let raw = format!(
            "{MINIMAL}\n[sensors.pm25]\nenabled = false\n[sensors.scd4x]\ninterval_secs = 30\n\
             [sensors.scd4x.source]\nco2 = {{ path = \"/tmp/co2\" }}\n"
        );
        let cfg = AgentConfig::from_toml_str(&raw).unwrap();
        let enabled: Vec<_> = cfg.sensors.enabled().collect();
        assert_eq!(
            enabled,
            vec![SensorKind::RadSens, SensorKind::Bme680, SensorKind::Scd4x]
        );
        assert_eq!(cfg.sensors.interval(SensorKind::Scd4x), Duration::from_secs(30));
        let co2 = &cfg.sensors.scd4x.source["co2"];
        assert_eq!(co2.scale, 1.0);
        assert_eq!(co2.offset, 0.0);
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = AgentConfig::from_toml_str("[influx]\nurl = \"http://x\"\norg = \"o\"\nbucket = \"b\"\n")
            .unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
        assert!(err.to_string().contains("influx.token"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let raw = format!("{MINIMAL}\n[dispatch]\nsend_interval_secs = 0\n");
        let err = AgentConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("dispatch.send_interval_secs"));
    }

    #[test]
    fn gate_policies() {
        assert!(!GatePolicy::Both.is_open(true, false));
        assert!(GatePolicy::Both.is_open(true, true));
        assert!(GatePolicy::Legacy.is_open(true, false));
        assert!(GatePolicy::Legacy.is_open(false, true));
        assert!(!GatePolicy::Legacy.is_open(false, false));
    }

    #[test]
    fn legacy_gate_parses() {
        let raw = format!("{MINIMAL}\n[dispatch]\ngate = \"legacy\"\n");
        let cfg = AgentConfig::from_toml_str(&raw).unwrap();
        assert_eq!(cfg.dispatch.gate, GatePolicy::Legacy);
    }
}
