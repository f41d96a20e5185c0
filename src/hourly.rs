//! Per-hour statistics, emitted once the hour is over.
//!
//! Buckets are only flushed when the reporting cycle asks for them, so a
//! bucket keeps absorbing late samples until the first report that observes
//! the next hour.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::models::Sample;

// ---

const SECONDS_PER_HOUR: i64 = 3600;

/// A UTC calendar hour, stored as whole hours since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourKey(i64);

impl HourKey {
    // ---
    pub fn of(ts: DateTime<Utc>) -> Self {
        Self(ts.timestamp().div_euclid(SECONDS_PER_HOUR))
    }

    /// Start of the hour.
    pub fn start(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0 * SECONDS_PER_HOUR, 0)
    }
}

/// Formats as `YYYY-MM-DDTHH`.
impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start() {
            Some(start) => write!(f, "{}", start.format("%Y-%m-%dT%H")),
            None => write!(f, "hour#{}", self.0),
        }
    }
}

impl Serialize for HourKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Accumulator {
    count: u32,
    sum_t: f64,
    sum_h: f64,
    min_t: f64,
    max_t: f64,
    min_h: f64,
    max_h: f64,
}

impl Accumulator {
    fn empty(sample: &Sample) -> Self {
        Self {
            count: 0,
            sum_t: 0.0,
            sum_h: 0.0,
            min_t: sample.temperature,
            max_t: sample.temperature,
            min_h: sample.humidity,
            max_h: sample.humidity,
        }
    }

    fn add(&mut self, sample: &Sample) {
        self.count += 1;
        self.sum_t += sample.temperature;
        self.sum_h += sample.humidity;
        self.min_t = self.min_t.min(sample.temperature);
        self.max_t = self.max_t.max(sample.temperature);
        self.min_h = self.min_h.min(sample.humidity);
        self.max_h = self.max_h.max(sample.humidity);
    }

    fn summarize(&self, hour: HourKey) -> HourlySummary {
        // count is never zero: buckets are only created by `add`
        let n = f64::from(self.count.max(1));
        HourlySummary {
            hour,
            count: self.count,
            avg_temperature: self.sum_t / n,
            min_temperature: self.min_t,
            max_temperature: self.max_t,
            avg_humidity: self.sum_h / n,
            min_humidity: self.min_h,
            max_humidity: self.max_h,
        }
    }
}

/// Statistics for one completed hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlySummary {
    // ---
    pub hour: HourKey,
    pub count: u32,
    pub avg_temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub avg_humidity: f64,
    pub min_humidity: f64,
    pub max_humidity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HourlyBuckets {
    buckets: BTreeMap<HourKey, Accumulator>,
}

impl HourlyBuckets {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: &Sample) {
        self.buckets
            .entry(HourKey::of(sample.timestamp))
            .or_insert_with(|| Accumulator::empty(sample))
            .add(sample);
    }

    /// Remove and return every bucket whose hour is strictly before
    /// `now_hour`, oldest first.
    pub fn flush_completed(&mut self, now_hour: HourKey) -> Vec<HourlySummary> {
        // ---
        let pending = self.buckets.split_off(&now_hour);
        let completed = std::mem::replace(&mut self.buckets, pending);
        completed
            .into_iter()
            .map(|(hour, acc)| acc.summarize(hour))
            .collect()
    }

    /// Hours with a bucket still open.
    pub fn pending_hours(&self) -> impl Iterator<Item = HourKey> + '_ {
        self.buckets.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
