//! ==============================================================================
//! parser.rs - serial line classification and pairing
//! ==============================================================================
//!
//! purpose:
//!     the device emits temperature and humidity as two independent
//!     newline-terminated lines ("Temperature: 23.5°C" / "Humidity: 61").
//!     classify() recognizes one line; Accumulator reassembles the two
//!     halves into a single Reading.
//!
//! pairing policy:
//!     each quantity has one pending slot carrying the value and the time it
//!     was seen. a newer line of the same kind replaces the slot. a slot
//!     older than PAIRING_WINDOW is expired, never paired. once both slots
//!     hold fresh values they are combined, stamped with the current
//!     wall-clock time, and cleared.
//!
//! relationships:
//!     - used by: serial.rs (one Accumulator per ingestion loop)
//!     - produces: store::Reading
//!
//! ==============================================================================

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Local};
use regex::Regex;

use crate::store::Reading;

/// how long a pending value may wait for its counterpart
const PAIRING_WINDOW_SECS: i64 = 30;

static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn number_re() -> &'static Regex {
    NUMBER_RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("invalid number regex"))
}

/// a single recognized value from one decoded line
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineValue {
    Temperature(f64),
    Humidity(f64),
}

/// classify one decoded text line. markers are case-sensitive and must sit at
/// line start; the numeric token may be integer or decimal, optionally signed,
/// with the unit suffix ignored. lines with a marker but no number, and lines
/// with no marker at all, carry no reading.
pub fn classify(line: &str) -> Option<LineValue> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("Temperature:") {
        extract_number(rest).map(LineValue::Temperature)
    } else if let Some(rest) = line.strip_prefix("Humidity:") {
        extract_number(rest).map(LineValue::Humidity)
    } else {
        None
    }
}

fn extract_number(text: &str) -> Option<f64> {
    number_re().find(text).and_then(|m| m.as_str().parse().ok())
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    value: f64,
    seen_at: DateTime<Local>,
}

/// accumulation window pairing independently-arriving temperature and
/// humidity lines into complete readings
#[derive(Debug)]
pub struct Accumulator {
    temperature: Option<Pending>,
    humidity: Option<Pending>,
    max_age: Duration,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::with_max_age(Duration::seconds(PAIRING_WINDOW_SECS))
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            temperature: None,
            humidity: None,
            max_age,
        }
    }

    /// feed one decoded line. returns a completed Reading (stamped `now`)
    /// once both quantities have been seen within the pairing window; the
    /// window is cleared on completion. unrecognized lines are ignored.
    pub fn observe(&mut self, line: &str, now: DateTime<Local>) -> Option<Reading> {
        match classify(line) {
            Some(LineValue::Temperature(value)) => {
                self.temperature = Some(Pending { value, seen_at: now });
            }
            Some(LineValue::Humidity(value)) => {
                self.humidity = Some(Pending { value, seen_at: now });
            }
            None => return None,
        }

        self.expire(now);

        match (self.temperature, self.humidity) {
            (Some(t), Some(h)) => {
                self.temperature = None;
                self.humidity = None;
                Some(Reading::new(now, t.value, h.value))
            }
            _ => None,
        }
    }

    fn expire(&mut self, now: DateTime<Local>) {
        let max_age = self.max_age;
        let stale = move |p: &Pending| now - p.seen_at > max_age;
        if self.temperature.as_ref().is_some_and(stale) {
            tracing::debug!("expiring stale pending temperature");
            self.temperature = None;
        }
        if self.humidity.as_ref().is_some_and(stale) {
            tracing::debug!("expiring stale pending humidity");
            self.humidity = None;
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}
