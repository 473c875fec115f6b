//! # Local display.
//!
//! Renders a few headline channels on a fixed cadence, independent of link and
//! clock state. Absent channels show `--`.
//!
//! ```text
//! Temp: 21.50C
//! Humid: 40.00%
//! Press: 1013.25hPa
//! CO2: 412 ppm
//! Rad: 12 uR/h
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::sensors::SensorKind;
use crate::state::ReadingStore;
use crate::tasks::{Task, pause};

/// Something that can show text lines.
#[async_trait]
pub trait DisplaySink: Send + 'static {
    async fn render(&mut self, lines: &[String]) -> std::io::Result<()>;
}

/// Writes the lines as debug records.
#[derive(Debug, Default)]
pub struct LogDisplay;

#[async_trait]
impl DisplaySink for LogDisplay {
    async fn render(&mut self, lines: &[String]) -> std::io::Result<()> {
        for line in lines {
            debug!(target: "envirovisor::display", "{line}");
        }
        Ok(())
    }
}

/// Display refresh loop.
pub struct DisplayTask {
    sink: Box<dyn DisplaySink>,
    store: ReadingStore,
    sensors: Vec<SensorKind>,
    interval: Duration,
    bus: Bus,
}

impl DisplayTask {
    /// `sensors` are the enabled sensors; only their labels are shown.
    pub fn new(
        sink: Box<dyn DisplaySink>,
        store: ReadingStore,
        sensors: Vec<SensorKind>,
        interval: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            sink,
            store,
            sensors,
            interval,
            bus,
        }
    }

    fn labels(&self) -> Vec<String> {
        let fixed = |id: &str| {
            self.store
                .get(id)
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "--".into())
        };
        let plain = |id: &str| {
            self.store
                .get(id)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "--".into())
        };

        let mut lines = Vec::new();
        if self.sensors.contains(&SensorKind::Bme680) {
            lines.push(with_unit("Temp: ", fixed("bme680.temperature"), "C"));
            lines.push(with_unit("Humid: ", fixed("bme680.humidity"), "%"));
            lines.push(with_unit("Press: ", fixed("bme680.pressure"), "hPa"));
        }
        if self.sensors.contains(&SensorKind::Scd4x) {
            lines.push(with_unit("CO2: ", plain("scd4x.co2"), " ppm"));
        }
        if self.sensors.contains(&SensorKind::RadSens) {
            lines.push(with_unit("Rad: ", plain("radsens.intensity_dynamic"), " uR/h"));
        }
        lines
    }
}

/// `--` carries no unit.
fn with_unit(label: &str, value: String, unit: &str) -> String {
    if value == "--" {
        format!("{label}{value}")
    } else {
        format!("{label}{value}{unit}")
    }
}

#[async_trait]
impl Task for DisplayTask {
    fn name(&self) -> &str {
        "display"
    }

    async fn run(self: Box<Self>, ctx: CancellationToken) -> Result<(), TaskError> {
        let mut this = self;
        loop {
            let lines = this.labels();
            let message = match this.sink.render(&lines).await {
                Ok(()) => lines.join(" | "),
                Err(e) => format!("render failed: {e}"),
            };
            this.bus
                .publish(Event::new(EventKind::DisplayUpdated).with_message(message));
            pause(&ctx, this.interval).await?;
        }
    }
}
