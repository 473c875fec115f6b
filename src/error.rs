//! Error types used by the envirovisor runtime and its collaborators.
//!
//! Every concern owns one enum:
//!
//! - [`RuntimeError`] — errors raised by the supervisor itself (fatal).
//! - [`TaskError`] — errors escaping a long-lived task (fatal by definition).
//! - [`SensorError`] — driver faults, classified for backoff.
//! - [`LinkError`], [`TimeError`], [`TransportError`] — network collaborators.
//! - [`StateError`] — reading-store ownership.
//! - [`EncodeError`], [`ParseError`] — line-protocol points.
//! - [`ConfigError`] — startup configuration problems.
//! - [`BuildError`] — agent assembly.
//!
//! All types provide `as_label` for logs and metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the supervisor.
///
/// Anything surfacing here ends the process; recovery happens per task, below
/// the supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A supervised task returned an error or panicked.
    #[error("task {task} died: {reason}")]
    TaskDied {
        /// Name of the task that died.
        task: String,
        /// Error message or panic payload.
        reason: String,
    },

    /// Shutdown grace period was exceeded; some tasks remained stuck.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use envirovisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::TaskDied { .. } => "runtime_task_died",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors escaping a supervised task.
///
/// Tasks in this crate absorb their own faults; a `TaskError` therefore means
/// something the task could not recover from.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Non-recoverable error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task was cancelled by a shutdown request.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Canceled => "task_canceled",
        }
    }
}

/// # Sensor driver faults.
///
/// The variant decides which backoff the poll task applies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Bus or communication level fault (I2C NACK, UART framing, unreadable file).
    #[error("i/o error: {0}")]
    Io(String),

    /// Logic or state error inside the driver (bad checksum, data not ready, garbage value).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Anything the driver could not classify.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl SensorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SensorError::Io(_) => "sensor_io",
            SensorError::Runtime(_) => "sensor_runtime",
            SensorError::Other(_) => "sensor_unclassified",
        }
    }
}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::Io(err.to_string())
    }
}

/// # Network link faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Association with the access point failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The link tooling itself could not be driven.
    #[error("link control failed: {0}")]
    Control(String),
}

impl LinkError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LinkError::Connect(_) => "link_connect",
            LinkError::Control(_) => "link_control",
        }
    }
}

/// # Network time faults.
#[derive(Error, Debug)]
pub enum TimeError {
    /// Socket level failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// No answer within the request timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The server answered with something that is not a usable time.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TimeError::Io(_) => "time_io",
            TimeError::Timeout(_) => "time_timeout",
            TimeError::InvalidResponse(_) => "time_invalid_response",
        }
    }
}

/// # Transport faults while pushing a point.
///
/// A non-204 status is **not** a transport fault; it is reported through the
/// response.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP client failure (DNS, TLS, connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured endpoint could not be turned into a URL.
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Http(_) => "transport_http",
            TransportError::Endpoint(_) => "transport_endpoint",
        }
    }
}

/// # Shared-state ownership faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// The store declares no channel for this sensor.
    #[error("no channels declared for sensor {0}")]
    UnknownSensor(String),

    /// Another writer already owns the sensor's channels.
    #[error("channels of sensor {0} already have a writer")]
    AlreadyClaimed(String),
}

impl StateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::UnknownSensor(_) => "state_unknown_sensor",
            StateError::AlreadyClaimed(_) => "state_already_claimed",
        }
    }
}

/// # Line-protocol encoding faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// NaN and infinities have no line-protocol representation.
    #[error("non-finite value {value} for {measurement}")]
    NonFinite {
        /// Measurement of the rejected point.
        measurement: String,
        /// The offending value.
        value: f64,
    },

    /// Measurement names must not be empty.
    #[error("empty measurement name")]
    EmptyMeasurement,

    /// A point needs at least one field.
    #[error("point {0} has no fields")]
    NoFields(String),
}

impl EncodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EncodeError::NonFinite { .. } => "encode_non_finite",
            EncodeError::EmptyMeasurement => "encode_empty_measurement",
            EncodeError::NoFields(_) => "encode_no_fields",
        }
    }
}

/// # Line-protocol parsing faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line has no field set.
    #[error("missing field set")]
    MissingFields,

    /// A tag or field is not a `key=value` pair.
    #[error("malformed pair: {0}")]
    MalformedPair(String),

    /// A field value is not a number.
    #[error("invalid field value: {0}")]
    InvalidValue(String),
}

impl ParseError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ParseError::MissingFields => "parse_missing_fields",
            ParseError::MalformedPair(_) => "parse_malformed_pair",
            ParseError::InvalidValue(_) => "parse_invalid_value",
        }
    }
}

/// # Configuration faults detected at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// File is not valid TOML for [`AgentConfig`](crate::AgentConfig).
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value is present but unusable.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending key.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors raised while wiring the agent.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::Config(e) => e.as_label(),
            BuildError::State(e) => e.as_label(),
        }
    }
}
