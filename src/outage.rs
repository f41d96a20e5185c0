//! Silence-based outage detection.
//!
//! Silence is measured from the last time *any* message arrived for a station
//! (ingestion time, not payload time). While a station stays silent past the
//! threshold, an alert is raised at most once per [`ALERT_THROTTLE_SECONDS`].
//! Nothing is emitted when the station comes back.
//!
//! # Clock injection
//! `evaluate` takes `now` rather than calling `Utc::now()` so tests stay
//! deterministic.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

// ---

/// Minimum spacing between repeated alerts for one station.
pub const ALERT_THROTTLE_SECONDS: i64 = 10;

/// A station has been silent longer than the outage threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutageAlert {
    // ---
    pub station_id: String,
    pub raised_at: DateTime<Utc>,
    /// Whole seconds since the last message.
    pub silent_seconds: i64,
}

/// `[ALERT] 2025-06-01 12:00:00 Station WS-01 OUTAGE (42s no data)`
impl fmt::Display for OutageAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ALERT] {} Station {} OUTAGE ({}s no data)",
            self.raised_at.format("%Y-%m-%d %H:%M:%S"),
            self.station_id,
            self.silent_seconds
        )
    }
}

/// Throttle cursor for one station's alerts.
#[derive(Debug, Clone, Default)]
pub struct OutageDetector {
    /// `None` until the first alert; equivalent to "allowed at epoch 0".
    next_alert_allowed_at: Option<DateTime<Utc>>,
}

impl OutageDetector {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an alert if `station_id` has been silent strictly longer than
    /// `threshold` and the throttle has elapsed. Emitting an alert moves the
    /// throttle cursor to `now + ALERT_THROTTLE_SECONDS`.
    ///
    /// A station that was never seen (`last_seen == None`) never alerts.
    pub fn evaluate(
        &mut self,
        station_id: &str,
        last_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        threshold: TimeDelta,
    ) -> Option<OutageAlert> {
        // ---
        let silence = now - last_seen?;
        if silence <= threshold {
            return None;
        }
        if self.next_alert_allowed_at.is_some_and(|allowed| now < allowed) {
            return None;
        }

        self.next_alert_allowed_at = Some(now + TimeDelta::seconds(ALERT_THROTTLE_SECONDS));
        Some(OutageAlert {
            station_id: station_id.to_string(),
            raised_at: now,
            silent_seconds: silence.num_seconds(),
        })
    }

    pub fn next_alert_allowed_at(&self) -> Option<DateTime<Utc>> {
        self.next_alert_allowed_at
    }
}
