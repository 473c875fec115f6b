//! # Line protocol points.
//!
//! ```text
//! measurement,tag=value[,tag=value...] field=value[,field=value...] [timestamp]
//! ```
//!
//! The agent emits points without a timestamp; the store assigns ingestion
//! time. Escaping follows the store's rules: commas and spaces in measurement
//! names, commas, spaces and `=` in tag keys, tag values and field keys.
//!
//! ```rust
//! use envirovisor::LinePoint;
//!
//! let line = LinePoint::new("co2")
//!     .tag("device", "scd4x")
//!     .tag("location", "Back-Porch")
//!     .field("value", 412.0)
//!     .encode()
//!     .unwrap();
//! assert_eq!(line, "co2,device=scd4x,location=Back-Porch value=412");
//!
//! let back = LinePoint::parse(&line).unwrap();
//! assert_eq!(back.measurement, "co2");
//! assert_eq!(back.field_value("value"), Some(412.0));
//! ```

use std::fmt::Write as _;

use crate::error::{EncodeError, ParseError};

/// One time-series point.
#[derive(Clone, Debug, PartialEq)]
pub struct LinePoint {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
    /// Nanosecond timestamp, only ever set by [`LinePoint::parse`].
    pub timestamp: Option<i64>,
}

impl LinePoint {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field_value(&self, key: &str) -> Option<f64> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Renders the point as one line (no trailing newline).
    pub fn encode(&self) -> Result<String, EncodeError> {
        if self.measurement.is_empty() {
            return Err(EncodeError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(EncodeError::NoFields(self.measurement.clone()));
        }
        if let Some((_, value)) = self.fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EncodeError::NonFinite {
                measurement: self.measurement.clone(),
                value: *value,
            });
        }

        let mut line = String::with_capacity(64);
        escape_into(&mut line, &self.measurement, &[',', ' ']);
        for (k, v) in &self.tags {
            line.push(',');
            escape_into(&mut line, k, &[',', ' ', '=']);
            line.push('=');
            escape_into(&mut line, v, &[',', ' ', '=']);
        }
        for (i, (k, v)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            escape_into(&mut line, k, &[',', ' ', '=']);
            let _ = write!(line, "={v}");
        }
        if let Some(ts) = self.timestamp {
            let _ = write!(line, " {ts}");
        }
        Ok(line)
    }

    /// Parses one line. Integer (`12i`, `12u`) and float fields are accepted;
    /// string and boolean fields are not.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let parts = split_unescaped(line.trim_end_matches(['\n', '\r']), ' ');
        let (series, fields, timestamp) = match parts.as_slice() {
            [series, fields] => (*series, *fields, None),
            [series, fields, ts] => (*series, *fields, Some(*ts)),
            _ => return Err(ParseError::MissingFields),
        };

        let mut series = split_unescaped(series, ',').into_iter();
        let measurement = unescape(series.next().unwrap_or_default());
        let mut point = LinePoint::new(measurement);

        for pair in series {
            let (k, v) = split_pair(pair)?;
            point.tags.push((unescape(k), unescape(v)));
        }

        if fields.is_empty() {
            return Err(ParseError::MissingFields);
        }
        for pair in split_unescaped(fields, ',') {
            let (k, v) = split_pair(pair)?;
            let number = v.strip_suffix(['i', 'u']).unwrap_or(v);
            let value: f64 = number
                .parse()
                .map_err(|_| ParseError::InvalidValue(v.to_string()))?;
            point.fields.push((unescape(k), value));
        }

        if let Some(ts) = timestamp {
            point.timestamp = Some(
                ts.parse()
                    .map_err(|_| ParseError::InvalidValue(ts.to_string()))?,
            );
        }
        Ok(point)
    }
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ (',' | ' ' | '=')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits on `sep` unless it is preceded by a backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn split_pair(pair: &str) -> Result<(&str, &str), ParseError> {
    match split_unescaped(pair, '=').as_slice() {
        [k, v] if !k.is_empty() => Ok((*k, *v)),
        _ => Err(ParseError::MalformedPair(pair.to_string())),
    }
}
