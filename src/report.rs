//! Per-tick report and its text rendering.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::hourly::HourlySummary;
use crate::outage::OutageAlert;
use crate::station::StationSnapshot;

// ---

const RULE_WIDTH: usize = 100;

/// One completed hour for one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationHourly {
    pub station_id: String,
    #[serde(flatten)]
    pub summary: HourlySummary,
}

/// Output of one reporting cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    // ---
    pub generated_at: Option<DateTime<Utc>>,
    /// Sorted by station id.
    pub stations: Vec<StationSnapshot>,
    /// Buckets flushed during this cycle.
    pub hourly: Vec<StationHourly>,
    /// Alerts raised during this cycle.
    pub alerts: Vec<OutageAlert>,
}

impl Report {
    pub fn station(&self, id: &str) -> Option<&StationSnapshot> {
        self.stations.iter().find(|s| s.id == id)
    }
}

fn fmt_num(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}

/// Render the dashboard text for a report. With `hide_invalid`, raw values
/// of stations whose last message was invalid are shown as `-`.
pub fn render(report: &Report, header: &str, hide_invalid: bool) -> String {
    // ---
    let mut out = String::new();
    let rule = "-".repeat(RULE_WIDTH);

    // Writing to a String cannot fail
    let _ = writeln!(out, "{header}");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{:<12} {:>8} {:>8} {:>7} {:>20} {:>20}",
        "Station", "Temp", "Hum", "Valid", "Last Seen", "5m Avg T/H"
    );
    let _ = writeln!(out, "{rule}");

    for st in &report.stations {
        let (t, h) = if hide_invalid && !st.last_valid {
            (None, None)
        } else {
            (st.temperature, st.humidity)
        };
        let last_seen = st
            .last_seen
            .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());
        let avg = format!(
            "{}/{}",
            fmt_num(st.window_average.map(|a| a.temperature)),
            fmt_num(st.window_average.map(|a| a.humidity))
        );
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>7} {:>20} {:>20}",
            st.id,
            fmt_num(t),
            fmt_num(h),
            if st.last_valid { "OK" } else { "INVALID" },
            last_seen,
            avg
        );
    }

    for st in &report.stations {
        if let Some(day) = &st.day_extremes {
            let _ = writeln!(
                out,
                "Day Min/Max {:<8}  T: {:.1}/{:.1}  H: {:.1}/{:.1}",
                st.id, day.min_temperature, day.max_temperature, day.min_humidity, day.max_humidity
            );
        }
    }

    for entry in &report.hourly {
        let _ = writeln!(out, "{}", hourly_line(entry));
    }

    for alert in &report.alerts {
        let _ = writeln!(out, "{alert}");
    }

    out
}

/// `[Hourly] WS-01 2025-06-01T10: count=3 T(avg/min/max)=... H(avg/min/max)=...`
pub fn hourly_line(entry: &StationHourly) -> String {
    // ---
    let s = &entry.summary;
    format!(
        "[Hourly] {} {}: count={} T(avg/min/max)={:.1}/{:.1}/{:.1} H(avg/min/max)={:.1}/{:.1}/{:.1}",
        entry.station_id,
        s.hour,
        s.count,
        s.avg_temperature,
        s.min_temperature,
        s.max_temperature,
        s.avg_humidity,
        s.min_humidity,
        s.max_humidity
    )
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::daily::DayExtremes;
    use crate::hourly::HourKey;
    use crate::window::Average;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 5).unwrap()
    }

    fn snapshot(id: &str, valid: bool) -> StationSnapshot {
        StationSnapshot {
            id: id.to_string(),
            last_seen: Some(now()),
            last_valid: valid,
            temperature: Some(if valid { 21.04 } else { -999.0 }),
            humidity: Some(45.0),
            window_average: Some(Average {
                temperature: 20.55,
                humidity: 44.0,
            }),
            day_extremes: Some(DayExtremes {
                date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                min_temperature: 18.0,
                max_temperature: 23.0,
                min_humidity: 40.0,
                max_humidity: 50.0,
            }),
        }
    }

    fn report() -> Report {
        Report {
            generated_at: Some(now()),
            stations: vec![snapshot("WS-01", true), snapshot("WS-02", false)],
            hourly: vec![StationHourly {
                station_id: "WS-01".to_string(),
                summary: HourlySummary {
                    hour: HourKey::of(Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap()),
                    count: 2,
                    avg_temperature: 20.0,
                    min_temperature: 19.0,
                    max_temperature: 21.0,
                    avg_humidity: 45.0,
                    min_humidity: 44.0,
                    max_humidity: 46.0,
                },
            }],
            alerts: vec![OutageAlert {
                station_id: "WS-03".to_string(),
                raised_at: now(),
                silent_seconds: 31,
            }],
        }
    }

    #[test]
    fn test_render_contains_all_sections() {
        // ---
        let text = render(&report(), "Weather", false);

        assert!(text.starts_with("Weather\n"));
        assert!(text.contains("WS-01"));
        assert!(text.contains("21.0"));
        assert!(text.contains("-999.0"));
        assert!(text.contains("2025-06-01 12:00:05"));
        assert!(text.contains("Day Min/Max WS-01     T: 18.0/23.0  H: 40.0/50.0"));
        assert!(text.contains(
            "[Hourly] WS-01 2025-06-01T11: count=2 T(avg/min/max)=20.0/19.0/21.0 H(avg/min/max)=45.0/44.0/46.0"
        ));
        assert!(text.contains("[ALERT] 2025-06-01 12:00:05 Station WS-03 OUTAGE (31s no data)"));
    }

    #[test]
    fn test_render_hides_invalid_values() {
        // ---
        let text = render(&report(), "Weather", true);
        assert!(!text.contains("-999.0"));
        let invalid_row = text
            .lines()
            .find(|l| l.starts_with("WS-02"))
            .expect("row for WS-02");
        assert!(invalid_row.contains("INVALID"));
    }

    #[test]
    fn test_render_marks_valid_rows_ok() {
        // ---
        for hide_invalid in [false, true] {
            let text = render(&report(), "Weather", hide_invalid);
            let valid_row = text
                .lines()
                .find(|l| l.starts_with("WS-01"))
                .expect("row for WS-01");
            assert!(valid_row.contains("OK"));
            assert!(!valid_row.contains("INVALID"));
        }
    }

    #[test]
    fn test_empty_report_renders_header_only() {
        let text = render(&Report::default(), "Weather", false);
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_report_serializes_hour_key_as_string() {
        // ---
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["hourly"][0]["hour"], "2025-06-01T11");
        assert_eq!(json["hourly"][0]["station_id"], "WS-01");
        assert_eq!(json["stations"][0]["day_extremes"]["date"], "2025-06-01");
        assert_eq!(json["alerts"][0]["silent_seconds"], 31);
    }
}
