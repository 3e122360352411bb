//! Vitals simulator
//!
//! Synthesizes a wearable vitals feed on a timer, keeps a bounded rolling
//! history, and derives health score, trends, insights and anomalies from it.
//!
//! # Lifecycle
//!
//! ```text
//! new(config)
//!   ↓ start()            backfill (if history empty) → one reading → arm timer
//! tick every interval    generate → history → trend → anomalies → notify
//!   ↓ stop()             timer cancelled, subscribers kept
//! shutdown() / drop      timer cancelled, subscribers cleared
//! ```
//!
//! The simulator is an ordinary owned value; the composition root decides
//! how it is shared (usually behind an `Arc`).

pub mod analytics;
pub mod generator;
pub mod history;

pub use analytics::{
    calculate_health_score, detect_anomalies, health_insights, Anomaly, AnomalyKind,
    DeviceStatus, HealthInsights, InsightTrends, MetricAverages, Severity, VitalsSummary,
};
pub use generator::{DayPhase, VitalsGenerator};
pub use history::{HistoryBuffer, Trend, TrendSnapshot};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::channel::{lock, Channel, SubscriptionId};
use crate::config::SimulatorConfig;
use crate::types::VitalsReading;

/// Anomalies retained for `anomalies()`.
const ANOMALY_LOG_CAPACITY: usize = 100;

struct SimState {
    history: HistoryBuffer,
    current: Option<VitalsReading>,
    trend: TrendSnapshot,
    last_health_score: Option<u8>,
    anomalies: VecDeque<Anomaly>,
}

struct Inner {
    config: SimulatorConfig,
    state: Mutex<SimState>,
    generator: Mutex<VitalsGenerator>,
    /// Held across "append + notify" so each tick is delivered as one unit
    tick_lock: Mutex<()>,
    readings: Channel<VitalsReading>,
    anomalies: Channel<Anomaly>,
    auto_generate: AtomicBool,
}

impl Inner {
    /// Fill history with hourly readings ending an hour before now.
    fn backfill_if_empty(&self) {
        let mut state = lock(&self.state);
        if !state.history.is_empty() || self.config.backfill_hours == 0 {
            return;
        }
        let now = Utc::now();
        let mut generator = lock(&self.generator);
        for hours_ago in (1..=self.config.backfill_hours).rev() {
            let at = now - chrono::Duration::hours(hours_ago as i64);
            state.history.push(generator.generate_at(at));
        }
        state.trend = TrendSnapshot::from_history(&state.history, self.config.trend_window);
        log::info!("Backfilled {} hourly readings", self.config.backfill_hours);
    }

    /// Generate one reading, record it and deliver it to subscribers.
    fn tick(&self) -> VitalsReading {
        let _tick = lock(&self.tick_lock);
        let reading = lock(&self.generator).generate();
        self.record(reading)
    }

    /// Append to history, run the anomaly detector and notify. Caller holds
    /// `tick_lock`.
    fn record(&self, reading: VitalsReading) -> VitalsReading {
        let anomalies = {
            let mut state = lock(&self.state);
            state.history.push(reading.clone());
            state.current = Some(reading.clone());
            state.trend = TrendSnapshot::from_history(&state.history, self.config.trend_window);
            let anomalies = detect_anomalies(&reading, &state.trend);
            for anomaly in &anomalies {
                if state.anomalies.len() == ANOMALY_LOG_CAPACITY {
                    state.anomalies.pop_back();
                }
                state.anomalies.push_front(anomaly.clone());
            }
            anomalies
        };

        log::debug!(
            "Generated reading {}: {} bpm, {}/{} mmHg, {}% SpO2, {:.1}°F",
            reading.id,
            reading.heart_rate,
            reading.blood_pressure_systolic,
            reading.blood_pressure_diastolic,
            reading.oxygen_saturation,
            reading.body_temperature
        );
        for anomaly in anomalies {
            log::warn!("Anomaly ({:?}, {:?}): {}", anomaly.kind, anomaly.severity, anomaly.message);
            self.anomalies.publish(anomaly);
        }

        self.readings.publish(reading.clone());
        reading
    }
}

pub struct VitalsSimulator {
    inner: Arc<Inner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl VitalsSimulator {
    /// # Panics
    /// If `config.history_capacity` is zero; run `config.validate()` first
    /// for untrusted input.
    pub fn new(config: SimulatorConfig) -> Self {
        let state = SimState {
            history: HistoryBuffer::new(config.history_capacity),
            current: None,
            trend: TrendSnapshot::default(),
            last_health_score: None,
            anomalies: VecDeque::new(),
        };
        let generator = VitalsGenerator::new(config.seed);

        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
                generator: Mutex::new(generator),
                tick_lock: Mutex::new(()),
                readings: Channel::new("vitals"),
                anomalies: Channel::new("anomalies"),
                auto_generate: AtomicBool::new(true),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.inner.config
    }

    /// Start ticking at the configured interval.
    pub fn start(&self) {
        self.start_with_interval(self.inner.config.interval());
    }

    /// Start ticking at `interval`. Any existing timer is cancelled first, so
    /// repeated calls never leave more than one timer armed.
    ///
    /// Outside a tokio runtime only the immediate reading is produced and no
    /// timer is armed.
    pub fn start_with_interval(&self, interval: Duration) {
        let interval = if interval.is_zero() {
            log::warn!("Zero tick interval requested; using configured interval");
            self.inner.config.interval()
        } else {
            interval
        };

        self.stop();
        self.inner.backfill_if_empty();
        self.inner.tick();

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("No tokio runtime ({}); vitals simulator will not tick", e);
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let mut timer = lock(&self.timer);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                if !inner.auto_generate.load(Ordering::SeqCst) {
                    log::debug!("Auto-generation disabled; skipping tick");
                    continue;
                }
                inner.tick();
            }
        }));
        log::info!("Vitals simulator started ({} ms interval)", interval.as_millis());
    }

    /// Cancel the timer. No-op when not running.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
            log::info!("Vitals simulator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timer).as_ref().map_or(false, |handle| !handle.is_finished())
    }

    /// Gate timer ticks. Disabling also cancels the timer; the current
    /// reading is kept.
    pub fn set_auto_generation(&self, enabled: bool) {
        self.inner.auto_generate.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.stop();
        }
    }

    pub fn is_auto_generating(&self) -> bool {
        self.inner.auto_generate.load(Ordering::SeqCst)
    }

    /// Register for every new reading. If a reading already exists the
    /// callback is invoked with it before this returns.
    ///
    /// Callbacks run on the ticking thread and may read simulator state, but
    /// must not call `generate_manual_reading` or `start`.
    pub fn subscribe(&self, callback: Box<dyn Fn(&VitalsReading) + Send + Sync>) -> SubscriptionId {
        self.inner.readings.subscribe_with_replay(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.readings.unsubscribe(id)
    }

    /// Register for tick-time anomalies.
    pub fn subscribe_anomalies(&self, callback: Box<dyn Fn(&Anomaly) + Send + Sync>) -> SubscriptionId {
        self.inner.anomalies.subscribe(callback)
    }

    pub fn unsubscribe_anomalies(&self, id: SubscriptionId) -> bool {
        self.inner.anomalies.unsubscribe(id)
    }

    /// Async stream of readings.
    pub fn updates(&self) -> broadcast::Receiver<VitalsReading> {
        self.inner.readings.updates()
    }

    /// Produce a reading outside the timer cadence. Works whether or not the
    /// timer is running.
    pub fn generate_manual_reading(&self) -> VitalsReading {
        self.inner.tick()
    }

    pub fn current_reading(&self) -> Option<VitalsReading> {
        lock(&self.inner.state).current.clone()
    }

    pub fn trend_snapshot(&self) -> TrendSnapshot {
        lock(&self.inner.state).trend.clone()
    }

    /// Score `reading` against the current trend window and cache the result.
    pub fn calculate_health_score(&self, reading: &VitalsReading) -> u8 {
        let mut state = lock(&self.inner.state);
        let score = calculate_health_score(reading, &state.trend);
        state.last_health_score = Some(score);
        score
    }

    pub fn last_health_score(&self) -> Option<u8> {
        lock(&self.inner.state).last_health_score
    }

    pub fn get_health_insights(&self) -> HealthInsights {
        let mut state = lock(&self.inner.state);
        let Some(current) = state.current.clone() else {
            return HealthInsights::empty();
        };
        let insights = health_insights(&current, &state.trend);
        state.last_health_score = Some(insights.health_score);
        insights
    }

    /// Summary over the most recent `window_hours` entries (one entry per
    /// hour is assumed; this is not a wall-clock window).
    pub fn get_vitals_summary(&self, window_hours: usize) -> VitalsSummary {
        let state = lock(&self.inner.state);
        let window = state.history.recent(window_hours);
        VitalsSummary {
            current: state.current.clone(),
            averages: MetricAverages::over(&window),
            window,
            total_data_points: state.history.len(),
        }
    }

    /// Newest-first history. `None` returns everything retained.
    pub fn get_historical_data(&self, limit: Option<usize>) -> Vec<VitalsReading> {
        let state = lock(&self.inner.state);
        state.history.recent(limit.unwrap_or(usize::MAX))
    }

    pub fn history_len(&self) -> usize {
        lock(&self.inner.state).history.len()
    }

    /// Recent tick-time anomalies, newest first.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        lock(&self.inner.state).anomalies.iter().cloned().collect()
    }

    /// Mock connectivity status; random on every call.
    pub fn get_device_status(&self) -> DeviceStatus {
        DeviceStatus::random(lock(&self.inner.generator).rng())
    }

    /// Number of subscriber callbacks that panicked.
    pub fn subscriber_fault_count(&self) -> u64 {
        self.inner.readings.fault_count() + self.inner.anomalies.fault_count()
    }

    /// Teardown: cancel the timer and drop every subscriber.
    pub fn shutdown(&self) {
        self.stop();
        self.inner.readings.clear();
        self.inner.anomalies.clear();
    }
}

impl Default for VitalsSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl Drop for VitalsSimulator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}
