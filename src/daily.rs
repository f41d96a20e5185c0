//! Calendar-day minimum/maximum tracking.
//!
//! Only the current UTC date is kept. A sample from a different date replaces
//! the previous day's extremes outright.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Sample;

// ---

/// Extremes for one calendar day. Temperature and humidity are tracked
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayExtremes {
    // ---
    pub date: NaiveDate,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub min_humidity: f64,
    pub max_humidity: f64,
}

impl DayExtremes {
    fn starting_with(date: NaiveDate, sample: &Sample) -> Self {
        Self {
            date,
            min_temperature: sample.temperature,
            max_temperature: sample.temperature,
            min_humidity: sample.humidity,
            max_humidity: sample.humidity,
        }
    }

    fn absorb(&mut self, sample: &Sample) {
        self.min_temperature = self.min_temperature.min(sample.temperature);
        self.max_temperature = self.max_temperature.max(sample.temperature);
        self.min_humidity = self.min_humidity.min(sample.humidity);
        self.max_humidity = self.max_humidity.max(sample.humidity);
    }
}

#[derive(Debug, Clone, Default)]
pub struct DailyTracker {
    current: Option<DayExtremes>,
}

impl DailyTracker {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: &Sample) {
        // ---
        let date = sample.timestamp.date_naive();
        match self.current.as_mut() {
            Some(day) if day.date == date => day.absorb(sample),
            _ => self.current = Some(DayExtremes::starting_with(date, sample)),
        }
    }

    pub fn extremes(&self) -> Option<DayExtremes> {
        self.current
    }
}
