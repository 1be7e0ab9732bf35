//! ==============================================================================
//! refresh.rs - refresh cycle
//! ==============================================================================
//!
//! purpose:
//!     turns the current store contents into one renderable dashboard frame
//!     per tick: two time-ordered chart series, latest/min/max statistics,
//!     the formatted humidity label, and a status text block.
//!
//! degraded mode:
//!     frame assembly is fallible internally, but tick() always returns a
//!     Frame. a failure produces empty chart payloads tagged with the error
//!     message and an "Error" label, so the page has something to render
//!     every tick.
//!
//! synthesized data:
//!     with no live readings, a 20-point series is generated from a phase
//!     parameter advancing with the tick counter plus small zero-mean noise,
//!     so successive refreshes visibly animate without a sensor attached.
//!
//! relationships:
//!     - reads: store.rs (snapshot)
//!     - consumed by: server.rs (/api/frame)
//!
//! ==============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local};
use rand::Rng;
use serde::Serialize;

use crate::store::{Reading, ReadingStore};

/// points in a synthesized series
const SYNTH_POINTS: i64 = 20;

/// one chart payload: parallel time/value columns in time order
#[derive(Clone, Debug, Serialize)]
pub struct ChartSeries {
    pub title: String,
    pub unit: &'static str,
    /// clock labels, one per point
    pub labels: Vec<String>,
    pub timestamps_ms: Vec<i64>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    fn from_readings(
        title: String,
        unit: &'static str,
        readings: &[Reading],
        value: impl Fn(&Reading) -> f64,
    ) -> Self {
        Self {
            title,
            unit,
            labels: readings
                .iter()
                .map(|r| r.timestamp.format("%H:%M:%S").to_string())
                .collect(),
            timestamps_ms: readings.iter().map(|r| r.timestamp.timestamp_millis()).collect(),
            values: readings.iter().map(value).collect(),
        }
    }

    /// empty payload tagged with the failure, still accepted by the chart code
    fn error(message: &str, unit: &'static str) -> Self {
        Self {
            title: format!("Error: {message}"),
            unit,
            labels: Vec::new(),
            timestamps_ms: Vec::new(),
            values: Vec::new(),
        }
    }
}

/// latest/min/max of one quantity over the current series
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub latest: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    Live,
    Synthetic,
    Error,
}

/// one renderable refresh result; every tick produces exactly one
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub tick: u64,
    pub source: FrameSource,
    /// current humidity formatted "<value>%", or "Error"
    pub humidity_label: String,
    pub temperature: ChartSeries,
    pub humidity: ChartSeries,
    pub temperature_summary: Option<Summary>,
    pub humidity_summary: Option<Summary>,
    /// short multi-line debug/status block
    pub status_text: String,
    pub error: Option<String>,
}

impl Frame {
    fn degraded(tick: u64, message: &str) -> Self {
        Self {
            tick,
            source: FrameSource::Error,
            humidity_label: "Error".to_string(),
            temperature: ChartSeries::error(message, "°C"),
            humidity: ChartSeries::error(message, "%"),
            temperature_summary: None,
            humidity_summary: None,
            status_text: format!("Error in update #{tick}: {message}"),
            error: Some(message.to_string()),
        }
    }
}

/// periodic unit of work behind /api/frame
pub struct RefreshCycle {
    store: ReadingStore,
    counter: AtomicU64,
}

impl RefreshCycle {
    pub fn new(store: ReadingStore) -> Self {
        Self {
            store,
            counter: AtomicU64::new(0),
        }
    }

    /// next server-driven tick number
    pub fn next_tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// run one refresh. failures are absorbed here and surface as a degraded
    /// frame; the caller always receives something renderable.
    pub fn tick(&self, tick: u64) -> Frame {
        match self.assemble(tick, Local::now()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(tick, error = %format!("{e:#}"), "refresh degraded");
                Frame::degraded(tick, &format!("{e:#}"))
            }
        }
    }

    fn assemble(&self, tick: u64, now: DateTime<Local>) -> Result<Frame> {
        let (readings, source) = if self.store.is_empty() {
            (synthesize(tick, now), FrameSource::Synthetic)
        } else {
            (self.store.snapshot(), FrameSource::Live)
        };

        let temperature_summary = summarize(readings.iter().map(|r| r.temperature))?;
        let humidity_summary = summarize(readings.iter().map(|r| r.humidity))?;

        let temperature = ChartSeries::from_readings(
            format!("Temperature Over Time (Update #{tick})"),
            "°C",
            &readings,
            |r| r.temperature,
        );
        let humidity = ChartSeries::from_readings(
            format!("Humidity Over Time (Update #{tick})"),
            "%",
            &readings,
            |r| r.humidity,
        );

        let status_text = status_text(
            tick,
            now,
            source,
            readings.len(),
            &temperature_summary,
            &humidity_summary,
        );

        Ok(Frame {
            tick,
            source,
            humidity_label: format!("{:.1}%", humidity_summary.latest),
            temperature,
            humidity,
            temperature_summary: Some(temperature_summary),
            humidity_summary: Some(humidity_summary),
            status_text,
            error: None,
        })
    }
}

fn summarize(values: impl Iterator<Item = f64>) -> Result<Summary> {
    let mut latest = None;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        latest = Some(v);
        min = min.min(v);
        max = max.max(v);
    }
    let latest = latest.ok_or_else(|| anyhow!("no data points to summarize"))?;
    Ok(Summary { latest, min, max })
}

fn status_text(
    tick: u64,
    now: DateTime<Local>,
    source: FrameSource,
    points: usize,
    temperature: &Summary,
    humidity: &Summary,
) -> String {
    let source_line = match source {
        FrameSource::Live => format!("live ({points} readings)"),
        FrameSource::Synthetic => format!("synthetic ({points} points)"),
        FrameSource::Error => "error".to_string(),
    };
    format!(
        "Update #{tick} at {}\n\
         Source: {source_line}\n\
         Current: {:.1}°C, {:.1}%\n\
         Temperature range: {:.1}°C to {:.1}°C\n\
         Humidity range: {:.1}% to {:.1}%",
        now.format("%H:%M:%S"),
        temperature.latest,
        humidity.latest,
        temperature.min,
        temperature.max,
        humidity.min,
        humidity.max,
    )
}

/// deterministic-looking series rendered when no live data is present.
/// the phase advances with the tick and the point index, so the waves move.
fn synthesize(tick: u64, now: DateTime<Local>) -> Vec<Reading> {
    let mut rng = rand::rng();
    let mut readings = Vec::with_capacity(SYNTH_POINTS as usize);
    for i in (1..=SYNTH_POINTS).rev() {
        let phase = (tick as f64 + i as f64) * 0.1;
        let temperature = 20.0 + 5.0 * phase.sin() + rng.random_range(-0.5..0.5);
        let humidity =
            clamp_humidity(50.0 + 20.0 * (0.7 * phase).cos() + rng.random_range(-2.0..2.0));
        readings.push(Reading::new(
            now - Duration::minutes(i),
            round1(temperature),
            round1(humidity),
        ));
    }
    readings
}

/// synthesized humidity stays inside the display band
pub(crate) fn clamp_humidity(value: f64) -> f64 {
    value.clamp(20.0, 80.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_still_renders_a_full_frame_at_tick_zero() {
        let cycle = RefreshCycle::new(ReadingStore::new());
        let frame = cycle.tick(0);

        assert_eq!(frame.tick, 0);
        assert_eq!(frame.source, FrameSource::Synthetic);
        assert_eq!(frame.temperature.values.len(), SYNTH_POINTS as usize);
        assert_eq!(frame.humidity.values.len(), SYNTH_POINTS as usize);
        assert!(frame.humidity_label.ends_with('%'));
        assert!(!frame.status_text.is_empty());
        assert!(frame.error.is_none());
        assert!(frame.temperature_summary.is_some());
        assert!(frame.humidity_summary.is_some());
    }

    #[test]
    fn synthesized_humidity_is_clamped_to_the_display_band() {
        let readings = synthesize(3, Local::now());
        assert_eq!(readings.len(), SYNTH_POINTS as usize);
        for r in &readings {
            assert!((20.0..=80.0).contains(&r.humidity), "humidity {}", r.humidity);
        }
    }

    #[test]
    fn clamp_pins_out_of_band_values() {
        assert_eq!(clamp_humidity(105.0), 80.0);
        assert_eq!(clamp_humidity(3.0), 20.0);
        assert_eq!(clamp_humidity(55.5), 55.5);
    }

    #[test]
    fn synthesized_timestamps_are_in_order() {
        let readings = synthesize(0, Local::now());
        for pair in readings.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn live_store_frames_reflect_the_snapshot() {
        let store = ReadingStore::new();
        let base = Local::now();
        store.append(Reading::new(base - Duration::minutes(2), 21.0, 40.0));
        store.append(Reading::new(base - Duration::minutes(1), 23.0, 60.0));
        store.append(Reading::new(base, 22.0, 50.0));

        let cycle = RefreshCycle::new(store);
        let frame = cycle.tick(1);

        assert_eq!(frame.source, FrameSource::Live);
        assert_eq!(frame.temperature.values, vec![21.0, 23.0, 22.0]);
        assert_eq!(frame.humidity.values, vec![40.0, 60.0, 50.0]);
        assert_eq!(
            frame.temperature_summary,
            Some(Summary {
                latest: 22.0,
                min: 21.0,
                max: 23.0
            })
        );
        assert_eq!(frame.humidity_label, "50.0%");
        assert!(frame.status_text.contains("Update #1"));
        assert!(frame.status_text.contains("22.0°C"));
    }

    #[test]
    fn latest_timestamp_never_decreases_across_ticks() {
        let store = ReadingStore::new();
        let base = Local::now();
        store.append(Reading::new(base, 22.0, 50.0));

        let cycle = RefreshCycle::new(store.clone());
        let first = cycle.tick(0);
        store.append(Reading::new(base + Duration::seconds(2), 22.5, 51.0));
        let second = cycle.tick(1);

        let last_of = |f: &Frame| *f.temperature.timestamps_ms.last().expect("non-empty");
        assert!(last_of(&second) >= last_of(&first));
    }

    #[test]
    fn degraded_frame_keeps_all_four_outputs_renderable() {
        let frame = Frame::degraded(7, "boom");

        assert_eq!(frame.source, FrameSource::Error);
        assert_eq!(frame.humidity_label, "Error");
        assert!(frame.temperature.values.is_empty());
        assert!(frame.humidity.values.is_empty());
        assert!(frame.temperature.title.contains("boom"));
        assert_eq!(frame.status_text, "Error in update #7: boom");
        assert_eq!(frame.error.as_deref(), Some("boom"));
    }

    #[test]
    fn summarize_tracks_latest_min_max() {
        let summary = summarize([22.0, 19.5, 24.0, 21.0].into_iter()).expect("non-empty");
        assert_eq!(summary.latest, 21.0);
        assert_eq!(summary.min, 19.5);
        assert_eq!(summary.max, 24.0);
    }

    #[test]
    fn summarize_rejects_an_empty_series() {
        assert!(summarize(std::iter::empty()).is_err());
    }

    #[test]
    fn frames_serialize_to_the_page_contract() {
        let frame = RefreshCycle::new(ReadingStore::new()).tick(0);
        let json = serde_json::to_value(&frame).expect("frame serializes");

        assert_eq!(json["source"], "synthetic");
        assert!(json["error"].is_null());
        assert_eq!(
            json["temperature"]["values"]
                .as_array()
                .expect("values array")
                .len(),
            SYNTH_POINTS as usize
        );
        assert!(json["humidity_label"].as_str().expect("label").ends_with('%'));
        assert!(json["status_text"].as_str().expect("status").contains("Update #0"));
    }

    #[test]
    fn server_tick_counter_increments() {
        let cycle = RefreshCycle::new(ReadingStore::new());
        assert_eq!(cycle.next_tick(), 0);
        assert_eq!(cycle.next_tick(), 1);
        assert_eq!(cycle.next_tick(), 2);
    }
}
