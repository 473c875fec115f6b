//! # Reading store: latest value per sensor channel.
//!
//! The store declares a fixed, ordered set of channels at construction. Every
//! channel starts absent, becomes present after its first successful poll and
//! keeps its last value until the process exits.
//!
//! ```text
//!   PollTask(bme680) ──ChannelWriter──┐
//!   PollTask(scd4x)  ──ChannelWriter──┼──► ReadingStore ──snapshot()──► Dispatcher
//!   PollTask(radsens)──ChannelWriter──┘         └────────get()────────► Display
//! ```
//!
//! ## Rules
//! - **Single writer**: a sensor's channels are written only through the
//!   [`ChannelWriter`] returned by [`ReadingStore::claim`]; a second claim fails
//!   until the first writer is dropped.
//! - **Whole-cycle publication**: [`ChannelWriter::publish`] updates every owned
//!   field of one reading under one lock, so readers never see half a cycle.
//! - **Declaration order**: [`ReadingStore::snapshot`] lists channels in the
//!   order they were declared.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::StateError;
use crate::sensors::Reading;

/// Static description of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Owning sensor (also the `device` tag).
    pub sensor: &'static str,
    /// Field name in the driver's reading.
    pub field: &'static str,
    /// Measurement name used on the wire.
    pub measurement: &'static str,
}

impl ChannelSpec {
    pub const fn new(sensor: &'static str, field: &'static str, measurement: &'static str) -> Self {
        Self {
            sensor,
            field,
            measurement,
        }
    }

    /// Channel identifier, `sensor.field`.
    pub fn id(&self) -> String {
        format!("{}.{}", self.sensor, self.field)
    }
}

/// Point-in-time copy of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSnapshot {
    pub id: Arc<str>,
    pub spec: ChannelSpec,
    /// `None` until the first successful poll.
    pub value: Option<f64>,
    /// Time since the last write, `None` while absent.
    pub age: Option<Duration>,
}

struct Slot {
    spec: ChannelSpec,
    id: Arc<str>,
    value: Option<f64>,
    updated_at: Option<Instant>,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Slot>,
    claimed: Vec<&'static str>,
}

/// Shared table of the latest reading per channel.
///
/// Cloning is cheap and yields another handle to the same table.
#[derive(Clone, Default)]
pub struct ReadingStore {
    inner: Arc<RwLock<Inner>>,
}

impl ReadingStore {
    /// Declares the channel set; all channels start absent.
    pub fn new(channels: impl IntoIterator<Item = ChannelSpec>) -> Self {
        let slots = channels
            .into_iter()
            .map(|spec| Slot {
                id: Arc::from(spec.id()),
                spec,
                value: None,
                updated_at: None,
            })
            .collect();
        Self {
            inner: Arc::new(RwLock::new(Inner {
                slots,
                claimed: Vec::new(),
            })),
        }
    }

    /// Hands out the only writer for `sensor`'s channels.
    pub fn claim(&self, sensor: &str) -> Result<ChannelWriter, StateError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let indices: Vec<usize> = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.spec.sensor == sensor)
            .map(|(i, _)| i)
            .collect();
        let Some(&first) = indices.first() else {
            return Err(StateError::UnknownSensor(sensor.to_string()));
        };
        if inner.claimed.iter().any(|s| *s == sensor) {
            return Err(StateError::AlreadyClaimed(sensor.to_string()));
        }

        let owner = inner.slots[first].spec.sensor;
        inner.claimed.push(owner);
        Ok(ChannelWriter {
            store: self.clone(),
            sensor: owner,
            indices,
        })
    }

    /// Copies every channel, in declaration order.
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        inner
            .slots
            .iter()
            .map(|slot| ChannelSnapshot {
                id: Arc::clone(&slot.id),
                spec: slot.spec,
                value: slot.value,
                age: slot.updated_at.map(|at| now.saturating_duration_since(at)),
            })
            .collect()
    }

    /// Current value of the channel `id` (`sensor.field`).
    pub fn get(&self, id: &str) -> Option<f64> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .slots
            .iter()
            .find(|slot| &*slot.id == id)
            .and_then(|slot| slot.value)
    }

    /// Number of declared channels.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive write access to one sensor's channels.
///
/// Dropping the writer releases the claim.
pub struct ChannelWriter {
    store: ReadingStore,
    sensor: &'static str,
    indices: Vec<usize>,
}

impl ChannelWriter {
    pub fn sensor(&self) -> &'static str {
        self.sensor
    }

    /// Publishes every owned field present in `reading`; returns how many
    /// channels were updated. Fields without a channel are ignored.
    pub fn publish(&self, reading: &Reading) -> usize {
        let now = Instant::now();
        let mut inner = self
            .store
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut updated = 0;
        for &i in &self.indices {
            let slot = &mut inner.slots[i];
            if let Some(value) = reading.get(slot.spec.field) {
                slot.value = Some(value);
                slot.updated_at = Some(now);
                updated += 1;
            }
        }
        updated
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        let mut inner = self
            .store
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        inner.claimed.retain(|s| *s != self.sensor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ReadingStore {
        ReadingStore::new([
            ChannelSpec::new("bme680", "temperature", "temperature"),
            ChannelSpec::new("bme680", "humidity", "humidity"),
            ChannelSpec::new("scd4x", "co2", "co2"),
        ])
    }

    #[test]
    fn channels_start_absent() {
        let s = store();
        assert_eq!(s.len(), 3);
        assert!(s.snapshot().iter().all(|c| c.value.is_none() && c.age.is_none()));
        assert_eq!(s.get("scd4x.co2"), None);
    }

    #[test]
    fn second_claim_is_rejected_until_release() {
        let s = store();
        let w = s.claim("bme680").unwrap();
        assert_eq!(
            s.claim("bme680").err(),
            Some(StateError::AlreadyClaimed("bme680".into()))
        );
        drop(w);
        assert!(s.claim("bme680").is_ok());
    }

    #[test]
    fn unknown_sensor_cannot_claim() {
        assert_eq!(
            store().claim("pm25").err(),
            Some(StateError::UnknownSensor("pm25".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn publish_touches_only_owned_fields() {
        let s = store();
        let w = s.claim("bme680").unwrap();
        let n = w.publish(
            &Reading::new()
                .with("temperature", 21.5)
                .with("co2", 999.0)
                .with("gas", 1.0),
        );
        assert_eq!(n, 1);
        assert_eq!(s.get("bme680.temperature"), Some(21.5));
        assert_eq!(s.get("bme680.humidity"), None);
        assert_eq!(s.get("scd4x.co2"), None);

        tokio::time::advance(Duration::from_secs(3)).await;
        let snap = s.snapshot();
        assert_eq!(&*snap[0].id, "bme680.temperature");
        assert_eq!(snap[0].age, Some(Duration::from_secs(3)));
    }

    #[test]
    fn values_persist_after_later_partial_reads() {
        let s = store();
        let w = s.claim("bme680").unwrap();
        w.publish(&Reading::new().with("temperature", 20.0).with("humidity", 40.0));
        w.publish(&Reading::new().with("temperature", 21.0));
        assert_eq!(s.get("bme680.temperature"), Some(21.0));
        assert_eq!(s.get("bme680.humidity"), Some(40.0));
    }
}
