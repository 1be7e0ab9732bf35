//! ==============================================================================
//! store.rs - bounded shared reading store
//! ==============================================================================
//!
//! purpose:
//!     holds the most recent sensor readings in a fixed-capacity FIFO buffer
//!     shared between the serial ingestion thread (writer) and the web
//!     server's refresh cycle (reader).
//!
//! sharing model:
//!     ReadingStore is a cloneable handle around Arc<Mutex<VecDeque>>.
//!     both sides receive their handle at construction time; nothing reaches
//!     into the buffer except through append/snapshot.
//!
//! relationships:
//!     - written by: serial.rs (ingestion loop), main.rs (optional demo seed)
//!     - read by: refresh.rs (frame assembly), server.rs (/api/readings)
//!
//! ==============================================================================

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local};
use rand::Rng;
use serde::Serialize;

/// maximum readings retained; older entries are evicted first
pub const STORE_CAPACITY: usize = 50;

// device envelope for a DHT-class sensor; values outside are rejected
const TEMP_RANGE: std::ops::RangeInclusive<f64> = -40.0..=85.0;
const HUMIDITY_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

/// one timestamped temperature/humidity data point
#[derive(Clone, Debug, Serialize)]
pub struct Reading {
    /// wall-clock time the pair was completed
    pub timestamp: DateTime<Local>,
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Local>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
        }
    }

    fn in_device_range(&self) -> bool {
        self.temperature.is_finite()
            && self.humidity.is_finite()
            && TEMP_RANGE.contains(&self.temperature)
            && HUMIDITY_RANGE.contains(&self.humidity)
    }
}

/// cloneable handle to the shared reading buffer
#[derive(Clone)]
pub struct ReadingStore {
    inner: Arc<Mutex<VecDeque<Reading>>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(STORE_CAPACITY))),
        }
    }

    /// append one reading, evicting the oldest entries past capacity.
    /// an invalid reading (non-finite or outside the device envelope) is
    /// rejected with a warning and leaves the store unchanged.
    pub fn append(&self, reading: Reading) -> bool {
        if !reading.in_device_range() {
            tracing::warn!(
                temperature = reading.temperature,
                humidity = reading.humidity,
                "rejecting invalid reading"
            );
            return false;
        }

        let mut buf = self.lock();
        buf.push_back(reading);
        while buf.len() > STORE_CAPACITY {
            buf.pop_front();
        }
        true
    }

    /// consistent point-in-time copy in insertion order, usable without a lock
    pub fn snapshot(&self) -> Vec<Reading> {
        self.lock().iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// pre-seed with 20 plausible readings spaced one minute apart, so the
    /// dashboard has a live-looking history before the first serial pair lands
    pub fn seed_demo(&self) {
        let now = Local::now();
        let mut rng = rand::rng();
        for i in (1..=20i64).rev() {
            let temperature = 20.0 + rng.random_range(-1.0..1.0);
            let humidity = (50.0f64 + rng.random_range(-5.0..5.0)).clamp(20.0, 80.0);
            self.append(Reading::new(now - Duration::minutes(i), temperature, humidity));
        }
        tracing::info!(rows = self.len(), "seeded demo readings");
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Reading>> {
        self.inner.lock().expect("reading store mutex poisoned")
    }
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f64, humidity: f64) -> Reading {
        Reading::new(Local::now(), temperature, humidity)
    }

    #[test]
    fn starts_empty() {
        let store = ReadingStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn append_caps_at_capacity_keeping_newest() {
        let store = ReadingStore::new();
        for i in 0..120 {
            assert!(store.append(reading(f64::from(i % 60), 50.0)));
            assert!(store.len() <= STORE_CAPACITY);
        }

        let snap = store.snapshot();
        assert_eq!(snap.len(), STORE_CAPACITY);
        // entries 70..120 survive, in insertion order
        for (offset, r) in snap.iter().enumerate() {
            assert_eq!(r.temperature, f64::from((70 + offset as i32) % 60));
        }
    }

    #[test]
    fn invalid_readings_leave_store_unchanged() {
        let store = ReadingStore::new();
        assert!(store.append(reading(22.0, 55.0)));

        assert!(!store.append(reading(22.0, f64::NAN)));
        assert!(!store.append(reading(f64::INFINITY, 55.0)));
        assert!(!store.append(reading(22.0, f64::NEG_INFINITY)));
        assert!(!store.append(reading(120.0, 55.0)));
        assert!(!store.append(reading(22.0, 101.0)));
        assert!(!store.append(reading(-60.0, 55.0)));

        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].temperature, 22.0);
        assert_eq!(snap[0].humidity, 55.0);
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let store = ReadingStore::new();
        store.append(reading(20.0, 40.0));
        let snap = store.snapshot();

        store.append(reading(21.0, 41.0));
        assert_eq!(snap.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn seed_demo_stays_within_plausible_bounds() {
        let store = ReadingStore::new();
        store.seed_demo();

        let snap = store.snapshot();
        assert_eq!(snap.len(), 20);
        for pair in snap.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for r in &snap {
            assert!((19.0..=21.0).contains(&r.temperature));
            assert!((20.0..=80.0).contains(&r.humidity));
        }
    }
}
