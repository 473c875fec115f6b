//! End-to-end: the whole agent on paused time with scripted collaborators.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tokio_util::sync::CancellationToken;

use envirovisor::{
    Agent, AgentConfig, Collaborators, Credentials, Event, EventKind, LinePoint, LinkError,
    LogDisplay, NetworkLink, Reading, RuntimeError, SensorDriver, SensorError, SensorKind,
    StoreResponse, Subscribe, TimeError, TimeSource, Transport, TransportError,
};

struct UpLink;

#[async_trait]
impl NetworkLink for UpLink {
    async fn connect(&self, _creds: &Credentials) -> Result<(), LinkError> {
        Ok(())
    }
    async fn is_connected(&self) -> bool {
        true
    }
    async fn local_address(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40)))
    }
}

/// Answers after half a second, like a server across the network.
struct NetworkClock(FixedOffset);

#[async_trait]
impl TimeSource for NetworkClock {
    async fn now(&mut self) -> Result<DateTime<FixedOffset>, TimeError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Utc::now().with_timezone(&self.0))
    }
}

struct Scd4x;

#[async_trait]
impl SensorDriver for Scd4x {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        Ok(Reading::new()
            .with("co2", 412.0)
            .with("temperature", 22.5)
            .with("humidity", 41.0))
    }
}

#[derive(Clone, Default)]
struct Store {
    lines: Arc<Mutex<Vec<String>>>,
    status: u16,
}

#[async_trait]
impl Transport for Store {
    async fn post(&self, line: &str) -> Result<StoreResponse, TransportError> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(StoreResponse {
            status: self.status,
            body: String::new(),
        })
    }
}

#[derive(Default)]
struct Collect(Mutex<Vec<Event>>);

#[async_trait]
impl Subscribe for Collect {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.clone());
    }
    fn name(&self) -> &'static str {
        "collect"
    }
}

impl Collect {
    fn count(&self, kind: EventKind) -> usize {
        self.0.lock().unwrap().iter().filter(|e| e.kind == kind).count()
    }
}

fn config() -> AgentConfig {
    let mut cfg = AgentConfig::default();
    cfg.dispatch.location = "Back Porch".into();
    cfg.sensors.radsens.enabled = false;
    cfg.sensors.bme680.enabled = false;
    cfg.sensors.pm25.enabled = false;
    cfg
}

fn collaborators(store: Store) -> Collaborators {
    Collaborators {
        link: Box::new(UpLink),
        time_source: Box::new(|offset| Box::new(NetworkClock(offset)) as Box<dyn TimeSource>),
        connect: Box::new(move || Ok(Box::new(store) as Box<dyn Transport>)),
        drivers: vec![(SensorKind::Scd4x, Box::new(Scd4x) as Box<dyn SensorDriver>)],
        probe: None,
        display: Box::new(LogDisplay),
    }
}

fn stop_after(delay: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let t = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        t.cancel();
    });
    token
}

#[tokio::test(start_paused = true)]
async fn one_batch_reaches_the_store() {
    let store = Store {
        status: 204,
        ..Store::default()
    };
    let collect = Arc::new(Collect::default());

    let agent = Agent::builder(config())
        .with_subscribers(vec![collect.clone()])
        .with_collaborators(collaborators(store.clone()))
        .build()
        .unwrap();
    let clock = agent.clock().clone();

    let res = agent.run_until_cancelled(stop_after(Duration::from_secs(5))).await;
    assert!(res.is_ok(), "{res:?}");
    assert!(clock.is_trusted());

    let lines = store.lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 3, "{lines:?}");
    let points: Vec<LinePoint> = lines.iter().map(|l| LinePoint::parse(l).unwrap()).collect();
    let names: Vec<&str> = points.iter().map(|p| p.measurement.as_str()).collect();
    assert_eq!(names, vec!["co2", "temperature_scd4x", "humidity_scd4x"]);
    for p in &points {
        assert_eq!(p.tag_value("device"), Some("scd4x"));
        assert_eq!(p.tag_value("location"), Some("Back-Porch"));
    }
    assert_eq!(points[0].field_value("value"), Some(412.0));

    assert_eq!(collect.count(EventKind::PointSent), 3);
    assert_eq!(collect.count(EventKind::PointFailed), 0);
    assert_eq!(collect.count(EventKind::PointRejected), 0);
    assert_eq!(collect.count(EventKind::SensorFailed), 0);
    assert_eq!(collect.count(EventKind::TaskDied), 0);
    assert_eq!(collect.count(EventKind::LinkConnected), 1);
    assert_eq!(collect.count(EventKind::TimeSynced), 1);
    assert_eq!(collect.count(EventKind::AllStoppedWithin), 1);
}

#[tokio::test(start_paused = true)]
async fn rejected_points_do_not_stop_the_agent() {
    let store = Store {
        status: 400,
        ..Store::default()
    };
    let collect = Arc::new(Collect::default());

    let agent = Agent::builder(config())
        .with_subscribers(vec![collect.clone()])
        .with_collaborators(collaborators(store.clone()))
        .build()
        .unwrap();

    // The gate opens at t=1s; batches go out at 1s and 11s.
    let res = agent.run_until_cancelled(stop_after(Duration::from_secs(15))).await;
    assert!(res.is_ok(), "{res:?}");
    assert_eq!(store.lines.lock().unwrap().len(), 6);
    assert_eq!(collect.count(EventKind::PointRejected), 6);
    assert_eq!(collect.count(EventKind::TaskDied), 0);
}

#[tokio::test(start_paused = true)]
async fn store_session_failure_is_fatal() {
    let mut parts = collaborators(Store::default());
    parts.connect = Box::new(|| Err(TransportError::Endpoint("bad url".into())));

    let agent = Agent::builder(config())
        .with_collaborators(parts)
        .build()
        .unwrap();

    let res = agent.run_until_cancelled(CancellationToken::new()).await;
    match res {
        Err(RuntimeError::TaskDied { task, reason }) => {
            assert_eq!(task, "dispatcher");
            assert!(reason.contains("bad url"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
}
