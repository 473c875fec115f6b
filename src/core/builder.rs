//! # Agent assembly.
//!
//! [`AgentBuilder`] turns an [`AgentConfig`] into the task list the
//! [`Supervisor`] runs. Hardware and network access come from
//! [`Collaborators`]; [`Collaborators::from_config`] wires the real ones and
//! tests hand in scripted replacements.
//!
//! ```text
//! AgentConfig ──► AgentBuilder::build()
//!                   ├─ ReadingStore(channels of enabled sensors)
//!                   ├─ link_state(), clock_state()
//!                   └─ tasks, in start order:
//!                        watchdog ─► timesync ─► dispatcher ─► [display] ─► poll tasks
//! ```
//!
//! Watchdog, time sync and dispatcher always run. Each enabled sensor with a
//! driver gets a poll task; the display task runs only when enabled.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::supervisor::Supervisor;
use crate::config::AgentConfig;
use crate::display::{DisplaySink, DisplayTask, LogDisplay};
use crate::error::{BuildError, ConfigError, RuntimeError};
use crate::events::Bus;
use crate::network::{Credentials, NetworkLink, NmcliLink, Watchdog};
use crate::sensors::{PollTask, SensorDriver, SensorKind, SysfsDriver, channels_of};
use crate::state::{ClockReader, LinkReader, ReadingStore, clock_state, link_state};
use crate::subscribers::Subscribe;
use crate::tasks::TaskBox;
use crate::telemetry::{
    Connect, DispatchSettings, Dispatcher, InfluxTransport, ProcMeminfo, ResourceProbe, Transport,
};
use crate::timesync::{MakeTimeSource, SntpClient, TimeSync, TimeSource};

/// Everything the agent talks to outside the process.
pub struct Collaborators {
    /// Network interface driven by the watchdog.
    pub link: Box<dyn NetworkLink>,
    /// Builds the time source once the link is first up.
    pub time_source: MakeTimeSource,
    /// Opens the metrics-store session once the gate opens.
    pub connect: Connect,
    /// One driver per sensor; entries for disabled sensors are ignored.
    pub drivers: Vec<(SensorKind, Box<dyn SensorDriver>)>,
    /// Memory probe for resource reports, if enabled.
    pub probe: Option<Box<dyn ResourceProbe>>,
    /// Display sink, used only when the display is enabled.
    pub display: Box<dyn DisplaySink>,
}

impl Collaborators {
    /// Real collaborators: nmcli, SNTP, the HTTP metrics store, sysfs drivers,
    /// `/proc/meminfo` and the log display.
    ///
    /// Enabled sensors without any `source` entry get no driver.
    pub fn from_config(cfg: &AgentConfig) -> Self {
        let server = cfg.time.server.clone();
        let timeout = cfg.time.request_timeout();
        let time_source: MakeTimeSource = Box::new(move |offset| {
            Box::new(SntpClient::new(server, offset, timeout)) as Box<dyn TimeSource>
        });

        let influx = cfg.influx.clone();
        let connect: Connect = Box::new(move || {
            InfluxTransport::new(&influx).map(|t| Box::new(t) as Box<dyn Transport>)
        });

        let drivers = cfg
            .sensors
            .enabled()
            .filter_map(|kind| {
                let source = &cfg.sensors.get(kind).source;
                if source.is_empty() {
                    warn!(sensor = kind.name(), "sensor enabled without a source, not polled");
                    return None;
                }
                let driver = SysfsDriver::new(kind, source, cfg.sensors.sea_level_pressure);
                Some((kind, Box::new(driver) as Box<dyn SensorDriver>))
            })
            .collect();

        let probe = cfg
            .dispatch
            .memory_monitoring
            .then(|| Box::new(ProcMeminfo::default()) as Box<dyn ResourceProbe>);

        Self {
            link: Box::new(NmcliLink::new(cfg.network.interface.clone())),
            time_source,
            connect,
            drivers,
            probe,
            display: Box::new(LogDisplay),
        }
    }
}

/// Builder for an [`Agent`].
pub struct AgentBuilder {
    cfg: AgentConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    collaborators: Option<Collaborators>,
}

impl AgentBuilder {
    pub fn new(cfg: AgentConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            collaborators: None,
        }
    }

    /// Sets the diagnostic sinks.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the real collaborators.
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    /// Wires state, tasks and supervisor.
    pub fn build(self) -> Result<Agent, BuildError> {
        let AgentBuilder {
            cfg,
            subscribers,
            collaborators,
        } = self;
        let parts = collaborators.unwrap_or_else(|| Collaborators::from_config(&cfg));

        let bus = Bus::new(cfg.bus_capacity);
        let enabled: Vec<SensorKind> = cfg.sensors.enabled().collect();
        let store = ReadingStore::new(channels_of(enabled.iter().copied()));
        let (link_writer, link) = link_state();
        let (clock_writer, clock) = clock_state();

        let mut tasks: Vec<TaskBox> = Vec::new();

        tasks.push(Box::new(Watchdog::new(
            parts.link,
            Credentials {
                ssid: cfg.network.ssid.clone(),
                psk: cfg.network.psk.clone(),
            },
            link_writer,
            cfg.network.connect_retry(),
            cfg.network.check_interval(),
            bus.clone(),
        )));

        let offset = cfg.time.utc_offset().ok_or_else(|| ConfigError::Invalid {
            field: "time.utc_offset_hours",
            reason: format!("{} is outside -23..=23", cfg.time.utc_offset_hours),
        })?;
        tasks.push(Box::new(
            TimeSync::new(parts.time_source, offset, link.clone(), clock_writer, bus.clone())
                .with_intervals(cfg.gate_poll(), cfg.time.resync_interval()),
        ));

        let mut dispatcher = Dispatcher::new(
            DispatchSettings::from_config(&cfg),
            store.clone(),
            link.clone(),
            clock.clone(),
            parts.connect,
            bus.clone(),
        );
        if let Some(probe) = parts.probe {
            dispatcher = dispatcher.with_probe(probe);
        }
        tasks.push(Box::new(dispatcher));

        if cfg.display.enabled {
            tasks.push(Box::new(DisplayTask::new(
                parts.display,
                store.clone(),
                enabled.clone(),
                cfg.display.update_interval(),
                bus.clone(),
            )));
        }

        let backoff = cfg.backoff.policy();
        for (kind, driver) in parts.drivers {
            if !enabled.contains(&kind) {
                continue;
            }
            let writer = store.claim(kind.name())?;
            tasks.push(Box::new(PollTask::new(
                driver,
                writer,
                cfg.sensors.interval(kind),
                backoff,
                bus.clone(),
            )));
        }

        Ok(Agent {
            supervisor: Supervisor::new(cfg.grace(), bus, subscribers),
            tasks,
            store,
            link,
            clock,
        })
    }
}

/// A fully wired agent, ready to run.
pub struct Agent {
    supervisor: Supervisor,
    tasks: Vec<TaskBox>,
    store: ReadingStore,
    link: LinkReader,
    clock: ClockReader,
}

impl Agent {
    pub fn builder(cfg: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(cfg)
    }

    /// Names of the tasks that will be started, in start order.
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    pub fn link(&self) -> &LinkReader {
        &self.link
    }

    pub fn clock(&self) -> &ClockReader {
        &self.clock
    }

    pub fn bus(&self) -> &Bus {
        self.supervisor.bus()
    }

    /// Runs until a task dies or a termination signal arrives.
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.supervisor.run(self.tasks).await
    }

    /// Runs until a task dies or `shutdown` is cancelled.
    pub async fn run_until_cancelled(self, shutdown: CancellationToken) -> Result<(), RuntimeError> {
        self.supervisor
            .run_until(self.tasks, async move { shutdown.cancelled().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSource;
    use crate::error::{LinkError, SensorError, StateError, TimeError};
    use crate::sensors::Reading;
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};
    use std::net::IpAddr;

    struct NoLink;

    #[async_trait]
    impl NetworkLink for NoLink {
        async fn connect(&self, _creds: &Credentials) -> Result<(), LinkError> {
            Err(LinkError::Connect("no radio".into()))
        }
        async fn is_connected(&self) -> bool {
            false
        }
        async fn local_address(&self) -> Option<IpAddr> {
            None
        }
    }

    struct NoClock;

    #[async_trait]
    impl TimeSource for NoClock {
        async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeError> {
            Err(TimeError::InvalidResponse("offline".into()))
        }
    }

    struct Silent;

    #[async_trait]
    impl SensorDriver for Silent {
        async fn read(&mut self) -> Result<Reading, SensorError> {
            Err(SensorError::Other("absent".into()))
        }
    }

    fn collaborators(drivers: Vec<(SensorKind, Box<dyn SensorDriver>)>) -> Collaborators {
        Collaborators {
            link: Box::new(NoLink),
            time_source: Box::new(|_| Box::new(NoClock) as Box<dyn TimeSource>),
            connect: Box::new(|| {
                Err(crate::error::TransportError::Endpoint("unused".into()))
            }),
            drivers,
            probe: None,
            display: Box::new(LogDisplay),
        }
    }

    #[test]
    fn builds_core_tasks_and_enabled_pollers() {
        let mut cfg = AgentConfig::default();
        cfg.sensors.pm25.enabled = false;
        cfg.display.enabled = true;

        let agent = Agent::builder(cfg)
            .with_collaborators(collaborators(vec![
                (SensorKind::Bme680, Box::new(Silent)),
                (SensorKind::Pm25, Box::new(Silent)),
                (SensorKind::Scd4x, Box::new(Silent)),
            ]))
            .build()
            .unwrap();

        assert_eq!(
            agent.task_names(),
            vec!["watchdog", "timesync", "dispatcher", "display", "bme680", "scd4x"]
        );
        // radsens, bme680 and scd4x channels are declared; pm25 is disabled.
        assert_eq!(agent.store().len(), 3 + 5 + 3);
        assert!(!agent.link().is_up());
        assert!(!agent.clock().is_trusted());
    }

    #[test]
    fn sensors_without_source_are_not_polled() {
        let mut cfg = AgentConfig::default();
        cfg.sensors.scd4x.source.insert(
            "co2".into(),
            FieldSource {
                path: "/sys/bus/iio/devices/iio:device0/in_concentration_co2_raw".into(),
                scale: 1.0,
                offset: 0.0,
            },
        );

        let parts = Collaborators::from_config(&cfg);
        let kinds: Vec<_> = parts.drivers.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, vec![SensorKind::Scd4x]);

        let agent = Agent::builder(cfg).with_collaborators(parts).build().unwrap();
        assert_eq!(
            agent.task_names(),
            vec!["watchdog", "timesync", "dispatcher", "scd4x"]
        );
        // channels of every enabled sensor stay declared, just absent
        assert_eq!(agent.store().len(), 3 + 5 + 3 + 6);
    }

    #[test]
    fn duplicate_driver_is_rejected() {
        let err = Agent::builder(AgentConfig::default())
            .with_collaborators(collaborators(vec![
                (SensorKind::Scd4x, Box::new(Silent)),
                (SensorKind::Scd4x, Box::new(Silent)),
            ]))
            .build()
            .err();
        assert!(
            matches!(&err, Some(BuildError::State(StateError::AlreadyClaimed(s))) if s == "scd4x"),
            "{err:?}"
        );
    }
}
