//! Data models for incoming station messages.
//!
//! A broker payload is decoded into a generic JSON object, then classified
//! into a [`Reading`]. Readings that pass [`ValidityBounds::is_valid`] yield a
//! [`Sample`], which is the only thing the aggregators ever see.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

// ---

/// Temperature value reported by stations whose sensor failed.
pub const SENSOR_ERROR_SENTINEL: f64 = -999.0;

/// Keys accepted for the station identifier, in lookup order.
const STATION_ID_KEYS: [&str; 2] = ["station_id", "stationId"];

/// A decoded message: whatever JSON object the station published.
pub type RawMessage = Map<String, Value>;

/// Why a message was dropped before touching any station state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Payload is not a JSON object.
    #[error("payload is not a JSON object")]
    Decode,

    /// Object has no usable station id.
    #[error("message has no station id")]
    MissingStationId,
}

/// Inclusive validity ranges for temperature (°C) and relative humidity (%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidityBounds {
    // ---
    pub temp_min: f64,
    pub temp_max: f64,
    pub hum_min: f64,
    pub hum_max: f64,
}

impl Default for ValidityBounds {
    fn default() -> Self {
        Self {
            temp_min: -50.0,
            temp_max: 80.0,
            hum_min: 0.0,
            hum_max: 100.0,
        }
    }
}

impl ValidityBounds {
    // ---
    /// Both values present and finite, temperature not the sensor error
    /// sentinel, and both inside their (inclusive) ranges.
    pub fn is_valid(&self, temperature: Option<f64>, humidity: Option<f64>) -> bool {
        // ---
        let (Some(t), Some(h)) = (temperature, humidity) else {
            return false;
        };
        if !t.is_finite() || !h.is_finite() {
            return false;
        }
        if t == SENSOR_ERROR_SENTINEL {
            return false;
        }
        (self.temp_min..=self.temp_max).contains(&t) && (self.hum_min..=self.hum_max).contains(&h)
    }
}

/// A validated measurement, ready for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    // ---
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
}

/// A classified message for a known station. Not stored; the station keeps
/// only `raw` as its last payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    // ---
    pub station_id: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    /// Timestamp carried in the message, if it parsed.
    pub timestamp: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl Reading {
    // ---
    /// Classify a decoded message. Only a missing station id rejects it;
    /// bad measurements still produce a `Reading` so the station is marked
    /// as seen.
    pub fn from_message(raw: RawMessage) -> Result<Self, Rejected> {
        // ---
        let station_id = STATION_ID_KEYS
            .iter()
            .find_map(|key| station_id_value(raw.get(*key)))
            .ok_or(Rejected::MissingStationId)?;

        let temperature = numeric(raw.get("temperature"));
        let humidity = numeric(raw.get("humidity"));
        let timestamp = raw
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        Ok(Self {
            station_id,
            temperature,
            humidity,
            timestamp,
            raw: Value::Object(raw),
        })
    }

    /// Decode a broker payload and classify it in one step.
    pub fn from_payload(payload: &[u8]) -> Result<Self, Rejected> {
        Self::from_message(decode(payload)?)
    }

    pub fn is_valid(&self, bounds: &ValidityBounds) -> bool {
        bounds.is_valid(self.temperature, self.humidity)
    }

    /// The sample to aggregate, if this reading is valid. Messages without
    /// a (parseable) timestamp are stamped with the ingestion time.
    pub fn sample(&self, bounds: &ValidityBounds, ingested_at: DateTime<Utc>) -> Option<Sample> {
        // ---
        if !self.is_valid(bounds) {
            return None;
        }
        Some(Sample {
            timestamp: self.timestamp.unwrap_or(ingested_at),
            temperature: self.temperature?,
            humidity: self.humidity?,
        })
    }
}

/// Parse a payload into a JSON object.
pub fn decode(payload: &[u8]) -> Result<RawMessage, Rejected> {
    // ---
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(Rejected::Decode),
    }
}

/// Coerce a JSON value to a number. Numeric strings count; the result may be
/// non-finite (e.g. `"inf"`), which the validity check rejects.
pub fn numeric(value: Option<&Value>) -> Option<f64> {
    // ---
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Formats carrying an explicit offset (`+02:00` or `+0200`).
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];

/// Formats without an offset; read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601-like timestamp. Strings without an offset are UTC and
/// a bare date means midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    // ---
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

fn station_id_value(value: Option<&Value>) -> Option<String> {
    // ---
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
