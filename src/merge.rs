//! Live feed merger
//!
//! Combines the simulator stream with a higher-priority live device stream
//! into the single "current vitals" value shown on the dashboard.
//!
//! Precedence:
//! - live sample, connected: overlay heart rate, SpO2 and temperature, each
//!   only when the value is finite and non-negative; timestamp moves to now
//! - live sample, disconnected: keep the last merged value as is
//! - simulator reading while no live device is connected: replace wholesale
//!
//! History is never overlaid; charts keep showing the simulator series.
//!
//! Updates are applied and published under one lock, so subscribers always
//! end on the same value `current()` reports. Callbacks must not feed the
//! merger again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use chrono::Utc;

use crate::channel::{lock, Channel, SubscriptionId};
use crate::feed::LiveDeviceFeed;
use crate::simulator::VitalsSimulator;
use crate::types::{DeviceInfo, LiveDeviceSample, MergedVitals, VitalsReading};

/// Prefix marking merged values that came straight from the simulator.
pub const MOCK_ID_PREFIX: &str = "mock-";

/// Highest heart rate the merged value can carry.
const LIVE_HEART_RATE_MAX: f64 = 300.0;

/// SpO2 is a percentage.
const LIVE_OXYGEN_MAX: f64 = 100.0;

fn usable(value: f64, max: f64) -> bool {
    value.is_finite() && value >= 0.0 && value <= max
}

pub struct LiveFeedMerger {
    /// Held across "apply + publish"
    update_lock: Mutex<()>,
    current: Mutex<MergedVitals>,
    merged: Channel<MergedVitals>,
    live_connected: AtomicBool,
    rejected_fields: AtomicU64,
}

impl LiveFeedMerger {
    /// Seeded with resting defaults so there is always something to show.
    pub fn new() -> Self {
        Self::with_seed(VitalsReading::resting_default())
    }

    pub fn with_seed(seed: MergedVitals) -> Self {
        Self {
            merged: Channel::with_value("merged_vitals", seed.clone()),
            update_lock: Mutex::new(()),
            current: Mutex::new(seed),
            live_connected: AtomicBool::new(false),
            rejected_fields: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> MergedVitals {
        lock(&self.current).clone()
    }

    pub fn is_live_connected(&self) -> bool {
        self.live_connected.load(Ordering::SeqCst)
    }

    /// Live values discarded as NaN, negative or out of range since
    /// construction.
    pub fn rejected_field_count(&self) -> u64 {
        self.rejected_fields.load(Ordering::Relaxed)
    }

    /// Apply a simulator reading. Ignored while a live device is connected.
    /// Returns whether the merged value changed.
    pub fn on_simulator_reading(&self, reading: &VitalsReading) -> bool {
        let _update = lock(&self.update_lock);
        let merged = {
            let mut current = lock(&self.current);
            if self.is_live_connected() {
                return false;
            }
            let mut merged = reading.clone();
            merged.id = format!("{}{}", MOCK_ID_PREFIX, reading.id);
            merged.device.id = format!("{}{}", MOCK_ID_PREFIX, reading.device.id);
            *current = merged.clone();
            merged
        };
        self.merged.publish(merged);
        true
    }

    /// Apply a live device sample. Returns whether the merged value changed.
    pub fn on_live_sample(&self, sample: &LiveDeviceSample) -> bool {
        let _update = lock(&self.update_lock);
        let merged = {
            let mut current = lock(&self.current);
            self.live_connected.store(sample.is_connected, Ordering::SeqCst);
            if !sample.is_connected {
                log::debug!("Live device disconnected; holding last merged value");
                return false;
            }

            let mut merged = current.clone();
            if usable(sample.heart_rate, LIVE_HEART_RATE_MAX) {
                merged.heart_rate = sample.heart_rate.round() as u16;
            } else {
                self.reject("heartRate", sample.heart_rate);
            }
            if usable(sample.oxygen_saturation, LIVE_OXYGEN_MAX) {
                merged.oxygen_saturation = sample.oxygen_saturation.round() as u8;
            } else {
                self.reject("oxygenSaturation", sample.oxygen_saturation);
            }
            if usable(sample.body_temperature, f64::MAX) {
                merged.body_temperature = sample.body_temperature;
            } else {
                self.reject("bodyTemperature", sample.body_temperature);
            }
            merged.device = DeviceInfo::live_wearable();
            merged.timestamp = Utc::now();

            *current = merged.clone();
            merged
        };
        self.merged.publish(merged);
        true
    }

    fn reject(&self, field: &str, value: f64) {
        self.rejected_fields.fetch_add(1, Ordering::Relaxed);
        log::warn!("Ignoring live {} value {}; keeping previous", field, value);
    }

    /// Register for merged-value changes; the current value is replayed
    /// immediately.
    pub fn subscribe(&self, callback: Box<dyn Fn(&MergedVitals) + Send + Sync>) -> SubscriptionId {
        self.merged.subscribe_with_replay(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.merged.unsubscribe(id)
    }

    pub fn updates(&self) -> tokio::sync::broadcast::Receiver<MergedVitals> {
        self.merged.updates()
    }

    /// Wire a simulator and a live feed into this merger.
    pub fn attach(
        self: &Arc<Self>,
        simulator: &VitalsSimulator,
        feed: &Arc<dyn LiveDeviceFeed>,
    ) -> MergeLinks {
        let merger = Arc::clone(self);
        let simulator_subscription = simulator.subscribe(Box::new(move |reading| {
            merger.on_simulator_reading(reading);
        }));

        let merger = Arc::clone(self);
        let feed_subscription = feed.subscribe(Box::new(move |sample| {
            merger.on_live_sample(sample);
        }));

        MergeLinks {
            simulator_subscription,
            feed_subscription,
            feed: Arc::clone(feed),
        }
    }
}

impl Default for LiveFeedMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriptions created by `LiveFeedMerger::attach`.
pub struct MergeLinks {
    simulator_subscription: SubscriptionId,
    feed_subscription: SubscriptionId,
    feed: Arc<dyn LiveDeviceFeed>,
}

impl MergeLinks {
    pub fn detach(self, simulator: &VitalsSimulator) {
        simulator.unsubscribe(self.simulator_subscription);
        self.feed.unsubscribe(self.feed_subscription);
    }
}
