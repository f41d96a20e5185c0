//! Station registry: the single owner of all station state.
//!
//! The registry is shared (`Arc<Registry>`) between the ingest path and the
//! reporting path. The outer map lock is only held to look up or insert a
//! station; each station is mutated under its own mutex, so different
//! stations never contend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, trace};

use crate::models::{Reading, Rejected, ValidityBounds};
use crate::report::{Report, StationHourly};
use crate::station::{StationSnapshot, StationState};

// ---

type SharedStation = Arc<Mutex<StationState>>;

/// What happened to one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// Dropped before touching any state.
    Dropped(Rejected),
    /// Applied to a station; `valid` says whether it reached the aggregators.
    Accepted { station_id: String, valid: bool },
}

#[derive(Debug)]
pub struct Registry {
    // ---
    bounds: ValidityBounds,
    outage_threshold: TimeDelta,
    stations: RwLock<BTreeMap<String, SharedStation>>,
}

impl Registry {
    // ---
    pub fn new(bounds: ValidityBounds, outage_threshold: TimeDelta) -> Self {
        Self {
            bounds,
            outage_threshold,
            stations: RwLock::new(BTreeMap::new()),
        }
    }

    /// Decode, classify and apply one broker payload received at `now`.
    pub fn ingest(&self, payload: &[u8], now: DateTime<Utc>) -> Ingest {
        // ---
        match Reading::from_payload(payload) {
            Ok(reading) => self.apply(reading, now),
            Err(reason) => {
                trace!("Dropping message ({} bytes): {}", payload.len(), reason);
                Ingest::Dropped(reason)
            }
        }
    }

    /// Apply an already classified reading received at `now`.
    pub fn apply(&self, reading: Reading, now: DateTime<Utc>) -> Ingest {
        // ---
        let station_id = reading.station_id.clone();
        let station = self.station_or_insert(&station_id);
        let valid = station
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(reading, &self.bounds, now);

        if !valid {
            debug!("Station {} sent an invalid reading", station_id);
        }
        Ingest::Accepted { station_id, valid }
    }

    /// Known station ids, sorted.
    pub fn station_ids(&self) -> Vec<String> {
        self.read_map().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    /// Current view of one station, without side effects.
    pub fn snapshot(&self, station_id: &str) -> Option<StationSnapshot> {
        let station = self.read_map().get(station_id).cloned()?;
        let snapshot = station.lock().unwrap_or_else(PoisonError::into_inner).snapshot();
        Some(snapshot)
    }

    /// Run one reporting cycle at `now`.
    ///
    /// Besides reading every station, this flushes hourly buckets that ended
    /// before the hour containing `now` and advances outage throttles for any
    /// alert raised. Call it on the reporting cadence, not ad hoc.
    pub fn report(&self, now: DateTime<Utc>) -> Report {
        // ---
        let stations: Vec<SharedStation> = self.read_map().values().cloned().collect();
        let mut report = Report {
            generated_at: Some(now),
            ..Report::default()
        };

        for station in stations {
            let mut state = station.lock().unwrap_or_else(PoisonError::into_inner);
            let snapshot = state.snapshot();
            let completed = state.flush_completed_hours(now);
            report
                .hourly
                .extend(completed.into_iter().map(|summary| StationHourly {
                    station_id: snapshot.id.clone(),
                    summary,
                }));
            report.stations.push(snapshot);
            if let Some(alert) = state.check_outage(now, self.outage_threshold) {
                report.alerts.push(alert);
            }
        }
        report
    }

    fn station_or_insert(&self, station_id: &str) -> SharedStation {
        // ---
        if let Some(station) = self.read_map().get(station_id) {
            return Arc::clone(station);
        }

        let mut map = self.stations.write().unwrap_or_else(PoisonError::into_inner);
        let station = map.entry(station_id.to_string()).or_insert_with(|| {
            info!("New station: {}", station_id);
            Arc::new(Mutex::new(StationState::new(station_id)))
        });
        Arc::clone(station)
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, SharedStation>> {
        self.stations.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn registry() -> Registry {
        Registry::new(ValidityBounds::default(), TimeDelta::seconds(30))
    }

    #[test]
    fn test_undecodable_and_anonymous_messages_leave_no_trace() {
        // ---
        let registry = registry();
        assert_eq!(
            registry.ingest(b"{not json", t0()),
            Ingest::Dropped(Rejected::Decode)
        );
        assert_eq!(
            registry.ingest(br#"{"temperature": 20.0, "humidity": 50.0}"#, t0()),
            Ingest::Dropped(Rejected::MissingStationId)
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_station_created_on_first_message_even_if_invalid() {
        // ---
        let registry = registry();
        let outcome = registry.ingest(br#"{"stationId": "WS-07", "temperature": "oops"}"#, t0());
        assert_eq!(
            outcome,
            Ingest::Accepted {
                station_id: "WS-07".to_string(),
                valid: false
            }
        );

        let snap = registry.snapshot("WS-07").unwrap();
        assert_eq!(snap.last_seen, Some(t0()));
        assert!(!snap.last_valid);
        assert_eq!(registry.snapshot("WS-08"), None);
    }

    #[test]
    fn test_station_ids_sorted() {
        // ---
        let registry = registry();
        for id in ["WS-03", "WS-01", "WS-02", "WS-01"] {
            let payload = format!(r#"{{"station_id": "{id}", "temperature": 20, "humidity": 50}}"#);
            registry.ingest(payload.as_bytes(), t0());
        }
        assert_eq!(registry.station_ids(), vec!["WS-01", "WS-02", "WS-03"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_report_flushes_hours_and_raises_alerts() {
        // ---
        let registry = registry();
        registry.ingest(
            br#"{"stationId": "WS-01", "temperature": 20.0, "humidity": 50.0}"#,
            t0(),
        );

        // Same hour, still fresh
        let report = registry.report(t0() + TimeDelta::seconds(10));
        assert_eq!(report.stations.len(), 1);
        assert!(report.hourly.is_empty());
        assert!(report.alerts.is_empty());

        // Next hour, long silent
        let later = t0() + TimeDelta::hours(1);
        let report = registry.report(later);
        assert_eq!(report.hourly.len(), 1);
        assert_eq!(report.hourly[0].station_id, "WS-01");
        assert_eq!(report.hourly[0].summary.count, 1);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].silent_seconds, 3600);

        // Throttled, and the bucket is gone
        let report = registry.report(later + TimeDelta::seconds(5));
        assert!(report.hourly.is_empty());
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn test_snapshot_has_no_side_effects() {
        // ---
        let registry = registry();
        registry.ingest(
            br#"{"stationId": "WS-01", "temperature": 20.0, "humidity": 50.0}"#,
            t0(),
        );
        let _ = registry.snapshot("WS-01");
        let _ = registry.snapshot("WS-01");

        let report = registry.report(t0() + TimeDelta::hours(1));
        assert_eq!(report.hourly.len(), 1);
        assert_eq!(report.alerts.len(), 1);
    }

    #[test]
    fn test_concurrent_ingest_serializes_per_station() {
        // ---
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let payload = format!(
                            r#"{{"stationId": "WS-{}", "temperature": {}, "humidity": 50}}"#,
                            worker % 2,
                            i % 30
                        );
                        registry.ingest(payload.as_bytes(), t0());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.station_ids(), vec!["WS-0", "WS-1"]);
        let report = registry.report(t0() + TimeDelta::hours(1));
        let total: u32 = report.hourly.iter().map(|h| h.summary.count).sum();
        assert_eq!(total, 200);
    }
}
