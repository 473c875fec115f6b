//! # Sensor catalog.
//!
//! The sensors this agent knows about, their channels and wire names. The order
//! of [`SensorKind::ALL`] and of each channel list is the dispatch order.
//!
//! | sensor  | field             | measurement                   |
//! |---------|-------------------|-------------------------------|
//! | radsens | intensity_dynamic | radiation_intensity_dynamic   |
//! | radsens | intensity_static  | radiation_intensity_static    |
//! | radsens | pulses            | number_of_pulses              |
//! | bme680  | temperature       | temperature                   |
//! | bme680  | humidity          | humidity                      |
//! | bme680  | pressure          | pressure                      |
//! | bme680  | gas               | gas_resistance                |
//! | bme680  | altitude          | altitude                      |
//! | scd4x   | co2               | co2                           |
//! | scd4x   | temperature       | temperature_scd4x             |
//! | scd4x   | humidity          | humidity_scd4x                |
//! | pm25    | pm10_standard ... | pm10_standard ...             |
//!
//! The PM2.5 driver may also report particle counts (`particles_03um` and
//! friends); those are logged with the reading but have no channel.

use std::time::Duration;

use crate::sensors::Reading;
use crate::state::ChannelSpec;

const RADSENS: &[ChannelSpec] = &[
    ChannelSpec::new("radsens", "intensity_dynamic", "radiation_intensity_dynamic"),
    ChannelSpec::new("radsens", "intensity_static", "radiation_intensity_static"),
    ChannelSpec::new("radsens", "pulses", "number_of_pulses"),
];

const BME680: &[ChannelSpec] = &[
    ChannelSpec::new("bme680", "temperature", "temperature"),
    ChannelSpec::new("bme680", "humidity", "humidity"),
    ChannelSpec::new("bme680", "pressure", "pressure"),
    ChannelSpec::new("bme680", "gas", "gas_resistance"),
    ChannelSpec::new("bme680", "altitude", "altitude"),
];

const SCD4X: &[ChannelSpec] = &[
    ChannelSpec::new("scd4x", "co2", "co2"),
    ChannelSpec::new("scd4x", "temperature", "temperature_scd4x"),
    ChannelSpec::new("scd4x", "humidity", "humidity_scd4x"),
];

const PM25: &[ChannelSpec] = &[
    ChannelSpec::new("pm25", "pm10_standard", "pm10_standard"),
    ChannelSpec::new("pm25", "pm25_standard", "pm25_standard"),
    ChannelSpec::new("pm25", "pm100_standard", "pm100_standard"),
    ChannelSpec::new("pm25", "pm10_env", "pm10_env"),
    ChannelSpec::new("pm25", "pm25_env", "pm25_env"),
    ChannelSpec::new("pm25", "pm100_env", "pm100_env"),
];

/// Known sensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Geiger counter (uR/h, pulse count).
    RadSens,
    /// Temperature, humidity, pressure, gas resistance.
    Bme680,
    /// CO2 with its own temperature and humidity.
    Scd4x,
    /// Particulate matter (PMS7003 family).
    Pm25,
}

impl SensorKind {
    /// Every sensor, in dispatch order.
    pub const ALL: [SensorKind; 4] = [
        SensorKind::RadSens,
        SensorKind::Bme680,
        SensorKind::Scd4x,
        SensorKind::Pm25,
    ];

    /// Stable name, used as `device` tag and config key.
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::RadSens => "radsens",
            SensorKind::Bme680 => "bme680",
            SensorKind::Scd4x => "scd4x",
            SensorKind::Pm25 => "pm25",
        }
    }

    pub fn channels(&self) -> &'static [ChannelSpec] {
        match self {
            SensorKind::RadSens => RADSENS,
            SensorKind::Bme680 => BME680,
            SensorKind::Scd4x => SCD4X,
            SensorKind::Pm25 => PM25,
        }
    }

    /// Poll interval used when the config does not set one.
    pub fn default_interval(&self) -> Duration {
        match self {
            SensorKind::Bme680 => Duration::from_secs(1),
            _ => Duration::from_secs(5),
        }
    }

    /// Fills in fields this sensor can derive from the others.
    ///
    /// BME680: `altitude` from `pressure` (hPa) and the sea-level reference.
    pub fn complete(&self, reading: &mut Reading, sea_level_hpa: f64) {
        if *self != SensorKind::Bme680 || reading.get("altitude").is_some() {
            return;
        }
        if let Some(pressure) = reading.get("pressure") {
            if let Some(alt) = altitude_m(pressure, sea_level_hpa) {
                reading.set("altitude", alt);
            }
        }
    }
}

/// International barometric formula.
pub fn altitude_m(pressure_hpa: f64, sea_level_hpa: f64) -> Option<f64> {
    if pressure_hpa <= 0.0 || sea_level_hpa <= 0.0 {
        return None;
    }
    Some(44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903)))
}

/// Channels of `kinds`, concatenated in the given order.
pub fn channels_of(kinds: impl IntoIterator<Item = SensorKind>) -> Vec<ChannelSpec> {
    kinds
        .into_iter()
        .flat_map(|k| k.channels().iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_order_starts_with_radsens() {
        let all = channels_of(SensorKind::ALL);
        assert_eq!(all.len(), 17);
        assert_eq!(all[0].measurement, "radiation_intensity_dynamic");
        assert_eq!(all[3].id(), "bme680.temperature");
        assert_eq!(all[16].measurement, "pm100_env");
    }

    #[test]
    fn altitude_is_derived_from_pressure() {
        let mut r = Reading::new().with("pressure", 1013.25);
        SensorKind::Bme680.complete(&mut r, 1013.25);
        assert!(r.get("altitude").unwrap().abs() < 1e-9);

        let mut r = Reading::new().with("pressure", 900.0);
        SensorKind::Bme680.complete(&mut r, 1013.25);
        let alt = r.get("altitude").unwrap();
        assert!((alt - 988.5).abs() < 1.0, "got {alt}");
    }

    #[test]
    fn reported_altitude_wins() {
        let mut r = Reading::new().with("pressure", 900.0).with("altitude", 5.0);
        SensorKind::Bme680.complete(&mut r, 1013.25);
        assert_eq!(r.get("altitude"), Some(5.0));
    }

    #[test]
    fn other_sensors_are_untouched() {
        let mut r = Reading::new().with("pressure", 900.0);
        SensorKind::Scd4x.complete(&mut r, 1013.25);
        assert_eq!(r.get("altitude"), None);
    }
}
