//! Per-station state.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::daily::{DailyTracker, DayExtremes};
use crate::hourly::{HourKey, HourlyBuckets, HourlySummary};
use crate::models::{numeric, Reading, ValidityBounds};
use crate::outage::{OutageAlert, OutageDetector};
use crate::window::{Average, SlidingWindow};

// ---

/// Everything known about one station. Created on the first message carrying
/// its id and kept for the life of the registry.
#[derive(Debug, Clone)]
pub struct StationState {
    // ---
    id: String,
    /// Ingestion time of the most recent message, valid or not.
    last_seen: Option<DateTime<Utc>>,
    last_payload: Value,
    last_valid: bool,
    window: SlidingWindow,
    daily: DailyTracker,
    hourly: HourlyBuckets,
    outage: OutageDetector,
}

/// Read-only view of a station for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSnapshot {
    // ---
    pub id: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_valid: bool,
    /// Last temperature as received, whether or not the message was valid.
    pub temperature: Option<f64>,
    /// Last humidity as received, whether or not the message was valid.
    pub humidity: Option<f64>,
    pub window_average: Option<Average>,
    pub day_extremes: Option<DayExtremes>,
}

impl StationState {
    // ---
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_seen: None,
            last_payload: Value::Null,
            last_valid: false,
            window: SlidingWindow::new(),
            daily: DailyTracker::new(),
            hourly: HourlyBuckets::new(),
            outage: OutageDetector::new(),
        }
    }

    /// Apply one classified message. Seen-time, payload and validity always
    /// update; only valid readings reach the aggregators. Returns validity.
    pub fn observe(
        &mut self,
        reading: Reading,
        bounds: &ValidityBounds,
        ingested_at: DateTime<Utc>,
    ) -> bool {
        // ---
        let sample = reading.sample(bounds, ingested_at);

        self.last_seen = Some(ingested_at);
        self.last_valid = sample.is_some();
        self.last_payload = reading.raw;

        if let Some(sample) = sample {
            self.window.push(sample);
            self.daily.record(&sample);
            self.hourly.record(&sample);
        }
        self.last_valid
    }

    pub fn last_payload(&self) -> &Value {
        &self.last_payload
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn snapshot(&self) -> StationSnapshot {
        // ---
        let finite = |key: &str| numeric(self.last_payload.get(key)).filter(|v| v.is_finite());

        StationSnapshot {
            id: self.id.clone(),
            last_seen: self.last_seen,
            last_valid: self.last_valid,
            temperature: finite("temperature"),
            humidity: finite("humidity"),
            window_average: self.window.average(),
            day_extremes: self.daily.extremes(),
        }
    }

    /// Emit and drop every hourly bucket older than the hour containing `now`.
    pub fn flush_completed_hours(&mut self, now: DateTime<Utc>) -> Vec<HourlySummary> {
        self.hourly.flush_completed(HourKey::of(now))
    }

    /// Advances the alert throttle when an alert is returned.
    pub fn check_outage(&mut self, now: DateTime<Utc>, threshold: TimeDelta) -> Option<OutageAlert> {
        self.outage.evaluate(&self.id, self.last_seen, now, threshold)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn reading(value: Value) -> Reading {
        match value {
            Value::Object(map) => Reading::from_message(map).unwrap(),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_valid_reading_feeds_aggregators() {
        // ---
        let mut station = StationState::new("WS-01");
        let valid = station.observe(
            reading(json!({"stationId": "WS-01", "temperature": 21.0, "humidity": 45.0})),
            &ValidityBounds::default(),
            t0(),
        );

        assert!(valid);
        let snap = station.snapshot();
        assert_eq!(snap.last_seen, Some(t0()));
        assert!(snap.last_valid);
        assert_eq!(snap.temperature, Some(21.0));
        assert_eq!(
            snap.window_average,
            Some(Average {
                temperature: 21.0,
                humidity: 45.0
            })
        );
        assert_eq!(snap.day_extremes.map(|d| d.max_temperature), Some(21.0));
    }

    #[test]
    fn test_invalid_reading_updates_seen_state_only() {
        // ---
        let mut station = StationState::new("WS-01");
        let bounds = ValidityBounds::default();
        station.observe(
            reading(json!({"stationId": "WS-01", "temperature": 21.0, "humidity": 45.0})),
            &bounds,
            t0(),
        );

        let later = t0() + TimeDelta::seconds(5);
        let valid = station.observe(
            reading(json!({"stationId": "WS-01", "temperature": -999, "humidity": 45.0})),
            &bounds,
            later,
        );

        assert!(!valid);
        let snap = station.snapshot();
        assert_eq!(snap.last_seen, Some(later));
        assert!(!snap.last_valid);
        // Raw values are still reported as received
        assert_eq!(snap.temperature, Some(-999.0));
        assert_eq!(station.last_payload()["temperature"], json!(-999));
        // Aggregates only know the first reading
        assert_eq!(station.window().len(), 1);
        assert_eq!(snap.day_extremes.map(|d| d.min_temperature), Some(21.0));
    }

    #[test]
    fn test_non_numeric_values_snapshot_as_none() {
        // ---
        let mut station = StationState::new("WS-01");
        station.observe(
            reading(json!({"stationId": "WS-01", "temperature": "n/a"})),
            &ValidityBounds::default(),
            t0(),
        );

        let snap = station.snapshot();
        assert_eq!(snap.temperature, None);
        assert_eq!(snap.humidity, None);
        assert_eq!(snap.window_average, None);
        assert_eq!(snap.day_extremes, None);
    }

    #[test]
    fn test_silence_uses_ingestion_time_not_payload_time() {
        // ---
        let mut station = StationState::new("WS-01");
        station.observe(
            reading(json!({
                "stationId": "WS-01",
                "temperature": 21.0,
                "humidity": 45.0,
                "timestamp": "2020-01-01T00:00:00Z"
            })),
            &ValidityBounds::default(),
            t0(),
        );

        let threshold = TimeDelta::seconds(30);
        assert!(station.check_outage(t0() + TimeDelta::seconds(10), threshold).is_none());
        assert!(station.check_outage(t0() + TimeDelta::seconds(31), threshold).is_some());
    }

    #[test]
    fn test_flush_uses_payload_hour() {
        // ---
        let mut station = StationState::new("WS-01");
        station.observe(
            reading(json!({
                "stationId": "WS-01",
                "temperature": 21.0,
                "humidity": 45.0,
                "timestamp": "2025-06-01T10:30:00Z"
            })),
            &ValidityBounds::default(),
            t0(),
        );

        let flushed = station.flush_completed_hours(t0());
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].hour.to_string(), "2025-06-01T10");
    }
}
