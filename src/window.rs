//! Five-minute rolling average over valid samples.
//!
//! Eviction is driven by the timestamp of the sample just pushed, not the
//! wall clock. Late or out-of-order samples are kept in arrival order, so the
//! window may briefly span more than five minutes of payload time.

use std::collections::VecDeque;

use chrono::TimeDelta;
use serde::Serialize;

use crate::models::Sample;

// ---

/// Length of the rolling window in seconds.
pub const WINDOW_SECONDS: i64 = 300;

/// Mean temperature and humidity over the samples in a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Average {
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    samples: VecDeque<Sample>,
}

impl SlidingWindow {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `sample`, then drop samples from the front while they are older
    /// than `sample.timestamp - WINDOW_SECONDS`.
    pub fn push(&mut self, sample: Sample) {
        // ---
        let cutoff = sample.timestamp - TimeDelta::seconds(WINDOW_SECONDS);
        self.samples.push_back(sample);
        while self
            .samples
            .front()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
    }

    /// `None` when the window holds no samples.
    pub fn average(&self) -> Option<Average> {
        // ---
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let (sum_t, sum_h) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(t, h), s| (t + s.temperature, h + s.humidity));

        Some(Average {
            temperature: sum_t / n,
            humidity: sum_h / n,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }
}
