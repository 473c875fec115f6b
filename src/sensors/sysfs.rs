//! # Sysfs / IIO sensor driver.
//!
//! Reads each configured field from a text attribute (for example
//! `/sys/bus/iio/devices/iio:device0/in_temp_input`), applies `scale` and
//! `offset`, then lets the catalog derive missing fields.
//!
//! Fault classification:
//! - attribute cannot be read → [`SensorError::Io`]
//! - attribute does not hold a number → [`SensorError::Runtime`]
//! - no attribute configured at all → [`SensorError::Other`]

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::FieldSource;
use crate::error::SensorError;
use crate::sensors::{Reading, SensorDriver, SensorKind};

/// Driver backed by sysfs attributes.
pub struct SysfsDriver {
    kind: SensorKind,
    /// Channel fields first (catalog order), then extra fields.
    fields: Vec<(String, FieldSource)>,
    sea_level_hpa: f64,
}

impl SysfsDriver {
    pub fn new(kind: SensorKind, sources: &BTreeMap<String, FieldSource>, sea_level_hpa: f64) -> Self {
        let mut fields: Vec<(String, FieldSource)> = kind
            .channels()
            .iter()
            .filter_map(|ch| {
                sources
                    .get(ch.field)
                    .map(|src| (ch.field.to_string(), src.clone()))
            })
            .collect();
        for (name, src) in sources {
            if !fields.iter().any(|(f, _)| f == name) {
                fields.push((name.clone(), src.clone()));
            }
        }
        Self {
            kind,
            fields,
            sea_level_hpa,
        }
    }
}

#[async_trait]
impl SensorDriver for SysfsDriver {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        if self.fields.is_empty() {
            return Err(SensorError::Other(format!(
                "no source configured for {}",
                self.kind.name()
            )));
        }

        let mut reading = Reading::new();
        for (field, src) in &self.fields {
            let raw = tokio::fs::read_to_string(&src.path)
                .await
                .map_err(|e| SensorError::Io(format!("{}: {e}", src.path.display())))?;
            let value: f64 = raw.trim().parse().map_err(|_| {
                SensorError::Runtime(format!(
                    "{}: not a number: {:?}",
                    src.path.display(),
                    raw.trim()
                ))
            })?;
            reading.set(field.as_str(), value * src.scale + src.offset);
        }
        self.kind.complete(&mut reading, self.sea_level_hpa);
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("envirovisor-sysfs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn source(path: PathBuf, scale: f64) -> FieldSource {
        FieldSource {
            path,
            scale,
            offset: 0.0,
        }
    }

    #[tokio::test]
    async fn reads_scaled_fields_and_derives_altitude() {
        let mut sources = BTreeMap::new();
        sources.insert(
            "temperature".to_string(),
            source(scratch("bme_temp", "21500\n"), 0.001),
        );
        sources.insert(
            "pressure".to_string(),
            source(scratch("bme_press", "101.325\n"), 10.0),
        );
        let mut driver = SysfsDriver::new(SensorKind::Bme680, &sources, 1013.25);

        let reading = driver.read().await.unwrap();
        assert!((reading.get("temperature").unwrap() - 21.5).abs() < 1e-9);
        assert!((reading.get("pressure").unwrap() - 1013.25).abs() < 1e-9);
        assert!(reading.get("altitude").unwrap().abs() < 1e-6);
    }

    #[tokio::test]
    async fn faults_are_classified() {
        let mut missing = BTreeMap::new();
        missing.insert(
            "co2".to_string(),
            source(PathBuf::from("/nonexistent/envirovisor/co2"), 1.0),
        );
        let err = SysfsDriver::new(SensorKind::Scd4x, &missing, 1013.25)
            .read()
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "sensor_io");

        let mut garbage = BTreeMap::new();
        garbage.insert("co2".to_string(), source(scratch("scd_co2", "busy"), 1.0));
        let err = SysfsDriver::new(SensorKind::Scd4x, &garbage, 1013.25)
            .read()
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "sensor_runtime");

        let err = SysfsDriver::new(SensorKind::Scd4x, &BTreeMap::new(), 1013.25)
            .read()
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "sensor_unclassified");
    }
}
