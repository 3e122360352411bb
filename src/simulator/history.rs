//! Rolling history of readings and the per-metric trend window derived from it.

use serde::{Serialize, Deserialize};

use crate::types::VitalsReading;

/// Relative change over the trend window that counts as a direction.
const TREND_THRESHOLD: f64 = 0.05;
/// Fewer points than this are always `Stable`.
pub const MIN_TREND_POINTS: usize = 3;

/// Fixed-capacity ring buffer of readings, read newest-first.
///
/// Slots are written in place once the buffer is full, so eviction of the
/// oldest reading is O(1).
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    slots: Vec<VitalsReading>,
    capacity: usize,
    /// Index of the slot the next push writes to
    head: usize,
}

impl HistoryBuffer {
    /// # Panics
    /// If `capacity` is zero. `SimulatorConfig::validate` rules that out.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn push(&mut self, reading: VitalsReading) {
        if self.slots.len() < self.capacity {
            self.slots.push(reading);
        } else {
            self.slots[self.head] = reading;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    pub fn latest(&self) -> Option<&VitalsReading> {
        self.iter().next()
    }

    /// Newest-first iteration.
    pub fn iter(&self) -> impl Iterator<Item = &VitalsReading> + '_ {
        let len = self.slots.len();
        (0..len).map(move |i| &self.slots[(self.head + self.capacity - 1 - i) % self.capacity])
    }

    /// Up to `n` most recent readings, newest first.
    pub fn recent(&self, n: usize) -> Vec<VitalsReading> {
        self.iter().take(n).cloned().collect()
    }
}

/// Direction of a metric over the trend window.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    /// Classify a chronological series by its relative change from first to last.
    pub fn of(series: &[f64]) -> Self {
        if series.len() < MIN_TREND_POINTS {
            return Trend::Stable;
        }
        let (first, last) = (series[0], series[series.len() - 1]);
        if first <= 0.0 {
            return Trend::Stable;
        }
        let change = (last - first) / first;
        if change > TREND_THRESHOLD {
            Trend::Increasing
        } else if change < -TREND_THRESHOLD {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

/// Most recent values per metric, oldest to newest.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendSnapshot {
    pub heart_rate: Vec<f64>,
    pub systolic: Vec<f64>,
    pub diastolic: Vec<f64>,
    pub oxygen_saturation: Vec<f64>,
    pub temperature: Vec<f64>,
}

impl TrendSnapshot {
    pub fn from_history(history: &HistoryBuffer, window: usize) -> Self {
        let mut recent = history.recent(window);
        recent.reverse();

        Self {
            heart_rate: recent.iter().map(|r| f64::from(r.heart_rate)).collect(),
            systolic: recent.iter().map(|r| f64::from(r.blood_pressure_systolic)).collect(),
            diastolic: recent.iter().map(|r| f64::from(r.blood_pressure_diastolic)).collect(),
            oxygen_saturation: recent.iter().map(|r| f64::from(r.oxygen_saturation)).collect(),
            temperature: recent.iter().map(|r| r.body_temperature).collect(),
        }
    }

    /// Points available per metric (all metrics share the same window).
    pub fn len(&self) -> usize {
        self.heart_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_empty()
    }

    /// Enough points for a trend to be anything other than the default.
    pub fn is_sufficient(&self) -> bool {
        self.len() >= MIN_TREND_POINTS
    }

    pub fn heart_rate_trend(&self) -> Trend {
        Trend::of(&self.heart_rate)
    }

    pub fn systolic_trend(&self) -> Trend {
        Trend::of(&self.systolic)
    }

    pub fn oxygen_trend(&self) -> Trend {
        Trend::of(&self.oxygen_saturation)
    }

    pub fn temperature_trend(&self) -> Trend {
        Trend::of(&self.temperature)
    }
}
