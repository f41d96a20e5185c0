//! Simulated weather station.
//!
//! Publishes plausible readings, occasionally reports the sensor error
//! sentinel and occasionally goes silent for a minute, so the monitor's
//! invalid-reading and outage paths get exercised end to end.
//!
//! Randomness is drawn up front into [`Draws`], which keeps
//! [`StationSimulator::step`] deterministic for tests.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde_json::{json, Value};

use crate::models::SENSOR_ERROR_SENTINEL;

// ---

/// Probability that a step starts a silent outage.
pub const OUTAGE_CHANCE: f64 = 0.005;

/// Probability that a published reading carries the error sentinel.
pub const SENTINEL_CHANCE: f64 = 0.01;

/// Length of a simulated outage.
pub const OUTAGE_SECONDS: i64 = 60;

/// Random inputs for one simulator step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draws {
    // ---
    pub outage_roll: f64,
    pub sentinel_roll: f64,
    pub temperature: f64,
    pub humidity: f64,
}

impl Draws {
    /// Temperature in 15..30 °C, humidity in 30..60 %, both to one decimal.
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self {
            outage_roll: rng.random(),
            sentinel_roll: rng.random(),
            temperature: round1(rng.random_range(15.0..=30.0)),
            humidity: round1(rng.random_range(30.0..=60.0)),
        }
    }
}

/// What the station does on one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Publish(Value),
    /// An outage starts now and lasts until `until`.
    OutageStarted { until: DateTime<Utc> },
    /// Still inside an outage.
    Silent,
}

#[derive(Debug, Clone)]
pub struct StationSimulator {
    station_id: String,
    silent_until: Option<DateTime<Utc>>,
}

impl StationSimulator {
    // ---
    pub fn new(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            silent_until: None,
        }
    }

    pub fn step(&mut self, now: DateTime<Utc>, draws: Draws) -> Step {
        // ---
        if self.silent_until.is_some_and(|until| now < until) {
            return Step::Silent;
        }
        if draws.outage_roll < OUTAGE_CHANCE {
            let until = now + TimeDelta::seconds(OUTAGE_SECONDS);
            self.silent_until = Some(until);
            return Step::OutageStarted { until };
        }

        let temperature = if draws.sentinel_roll < SENTINEL_CHANCE {
            SENSOR_ERROR_SENTINEL
        } else {
            draws.temperature
        };
        Step::Publish(station_payload(&self.station_id, temperature, draws.humidity, now))
    }
}

/// The JSON message a station publishes.
pub fn station_payload(station_id: &str, temperature: f64, humidity: f64, at: DateTime<Utc>) -> Value {
    json!({
        "stationId": station_id,
        "temperature": temperature,
        "humidity": humidity,
        "timestamp": at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Reading, ValidityBounds};
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn calm() -> Draws {
        Draws {
            outage_roll: 0.5,
            sentinel_roll: 0.5,
            temperature: 21.3,
            humidity: 44.8,
        }
    }

    fn classify(step: Step) -> Reading {
        match step {
            Step::Publish(value) => Reading::from_payload(value.to_string().as_bytes()).unwrap(),
            other => panic!("expected a publish, got {other:?}"),
        }
    }

    #[test]
    fn test_payload_shape() {
        // ---
        let payload = station_payload("WS-01", 21.3, 44.8, t0());
        assert_eq!(payload["stationId"], "WS-01");
        assert_eq!(payload["temperature"], 21.3);
        assert_eq!(payload["humidity"], 44.8);
        assert_eq!(payload["timestamp"], "2025-06-01T12:00:00Z");
    }

    #[test]
    fn test_published_reading_is_valid_for_monitor() {
        // ---
        let mut sim = StationSimulator::new("WS-01");
        let reading = classify(sim.step(t0(), calm()));

        assert_eq!(reading.station_id, "WS-01");
        assert_eq!(reading.timestamp, Some(t0()));
        assert!(reading.is_valid(&ValidityBounds::default()));
    }

    #[test]
    fn test_sentinel_reading_is_invalid_for_monitor() {
        // ---
        let mut sim = StationSimulator::new("WS-01");
        let draws = Draws {
            sentinel_roll: 0.001,
            ..calm()
        };
        let reading = classify(sim.step(t0(), draws));

        assert_eq!(reading.temperature, Some(SENSOR_ERROR_SENTINEL));
        assert!(!reading.is_valid(&ValidityBounds::default()));
    }

    #[test]
    fn test_outage_silences_station_for_a_minute() {
        // ---
        let mut sim = StationSimulator::new("WS-01");
        let draws = Draws {
            outage_roll: 0.001,
            ..calm()
        };
        assert_eq!(
            sim.step(t0(), draws),
            Step::OutageStarted {
                until: t0() + TimeDelta::seconds(60)
            }
        );

        assert_eq!(sim.step(t0() + TimeDelta::seconds(1), calm()), Step::Silent);
        assert_eq!(sim.step(t0() + TimeDelta::seconds(59), calm()), Step::Silent);
        assert!(matches!(
            sim.step(t0() + TimeDelta::seconds(60), calm()),
            Step::Publish(_)
        ));
    }

    #[test]
    fn test_random_draws_stay_in_range() {
        // ---
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let d = Draws::sample(&mut rng);
            assert!((15.0..=30.0).contains(&d.temperature));
            assert!((30.0..=60.0).contains(&d.humidity));
            assert!((0.0..1.0).contains(&d.outage_roll));
            assert_eq!(round1(d.temperature), d.temperature);
        }
    }
}
