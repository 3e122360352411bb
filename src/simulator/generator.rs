//! Synthetic vitals generation.
//!
//! Readings follow a simple circadian pattern: lower heart rate, pressure and
//! temperature at night, a small rise in the evening, noise on top, and hard
//! clamping to physiological bounds.

use chrono::{DateTime, Local, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::vitals::{
    DataQuality, DeviceInfo, SignalQuality, VitalsReading, DIASTOLIC_MAX, DIASTOLIC_MIN,
    HEART_RATE_MAX, HEART_RATE_MIN, OXYGEN_MAX, OXYGEN_MIN, SYSTOLIC_MAX, SYSTOLIC_MIN,
    TEMPERATURE_MAX, TEMPERATURE_MIN,
};

const BASE_HEART_RATE: f64 = 72.0;
const BASE_SYSTOLIC: f64 = 120.0;
const BASE_DIASTOLIC: f64 = 80.0;
const BASE_TEMPERATURE: f64 = 98.6;
const DAILY_STEP_GOAL: f64 = 12_000.0;

/// Base shape of the pseudo-ECG trace. Presentation only.
const ECG_PATTERN: [f64; 9] = [0.0, 0.1, -0.1, 1.2, -0.4, 0.2, 0.3, 0.1, 0.0];

/// Part of the day, as far as the circadian offsets are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayPhase {
    Night,
    Evening,
    Day,
}

impl DayPhase {
    /// Night runs 22:00 through 06:59, evening 18:00 through 21:59.
    pub fn from_hour(hour: u32) -> Self {
        if hour >= 22 || hour <= 6 {
            DayPhase::Night
        } else if hour >= 18 {
            DayPhase::Evening
        } else {
            DayPhase::Day
        }
    }

    /// (heart rate, systolic, diastolic, temperature) offsets from baseline.
    fn offsets(self) -> (f64, f64, f64, f64) {
        match self {
            DayPhase::Night => (-10.0, -5.0, -3.0, -0.5),
            DayPhase::Evening => (5.0, 0.0, 0.0, 0.3),
            DayPhase::Day => (0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// Produces readings from a seeded or entropy-backed RNG.
pub struct VitalsGenerator {
    rng: StdRng,
    device: DeviceInfo,
}

impl VitalsGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            device: DeviceInfo::simulated_wearable(),
        }
    }

    /// Generate a reading stamped with the current wall-clock time.
    pub fn generate(&mut self) -> VitalsReading {
        self.generate_at(Utc::now())
    }

    /// Generate a reading as if captured at `at`, using the local hour of `at`.
    pub fn generate_at(&mut self, at: DateTime<Utc>) -> VitalsReading {
        let hour = at.with_timezone(&Local).hour();
        self.generate_for_hour(hour, at)
    }

    pub fn generate_for_hour(&mut self, hour: u32, at: DateTime<Utc>) -> VitalsReading {
        let phase = DayPhase::from_hour(hour);
        let (hr_offset, sys_offset, dia_offset, temp_offset) = phase.offsets();

        let heart_rate = clamp_round(
            BASE_HEART_RATE + hr_offset + self.rng.gen_range(-8.0..=8.0),
            HEART_RATE_MIN,
            HEART_RATE_MAX,
        );
        let systolic = clamp_round(
            BASE_SYSTOLIC + sys_offset + self.rng.gen_range(-10.0..=10.0),
            SYSTOLIC_MIN,
            SYSTOLIC_MAX,
        );
        let diastolic = clamp_round(
            BASE_DIASTOLIC + dia_offset + self.rng.gen_range(-6.0..=6.0),
            DIASTOLIC_MIN,
            DIASTOLIC_MAX,
        );
        let oxygen = self.rng.gen_range(95..=100u8).clamp(OXYGEN_MIN, OXYGEN_MAX);
        let temperature = round_tenth(
            (BASE_TEMPERATURE + temp_offset + self.rng.gen_range(-0.4..=0.4))
                .clamp(TEMPERATURE_MIN, TEMPERATURE_MAX),
        );

        let steps = (f64::from(hour) / 24.0 * DAILY_STEP_GOAL + self.rng.gen_range(-500.0..=500.0))
            .max(0.0)
            .round() as u32;
        let sleep_hours = match phase {
            DayPhase::Night => round_tenth(self.rng.gen_range(6.5..9.0)),
            _ => round_tenth(self.rng.gen_range(5.0..8.0)),
        };

        VitalsReading {
            id: VitalsReading::new_id(),
            heart_rate,
            blood_pressure_systolic: systolic,
            blood_pressure_diastolic: diastolic,
            oxygen_saturation: oxygen,
            body_temperature: temperature,
            steps: Some(steps),
            sleep_hours: Some(sleep_hours),
            ecg_waveform: Some(self.ecg_waveform()),
            device: self.device.clone(),
            data_quality: self.data_quality(),
            timestamp: at,
            synced_at: Some(at),
        }
    }

    fn ecg_waveform(&mut self) -> String {
        ECG_PATTERN
            .iter()
            .map(|base| format!("{:.2}", base + self.rng.gen_range(-0.05..=0.05)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn data_quality(&mut self) -> DataQuality {
        let confidence = if self.rng.gen_bool(0.9) {
            self.rng.gen_range(0.85..=1.0)
        } else {
            self.rng.gen_range(0.70..0.85)
        };

        let roll: f64 = self.rng.gen();
        let signal_quality = if roll < 0.70 {
            SignalQuality::Excellent
        } else if roll < 0.90 {
            SignalQuality::Good
        } else if roll < 0.98 {
            SignalQuality::Fair
        } else {
            SignalQuality::Poor
        };

        DataQuality {
            confidence,
            signal_quality,
            artifacts_detected: self.rng.gen_bool(0.05),
        }
    }

    /// Expose the RNG for other mock values (device status).
    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

fn clamp_round(value: f64, min: u16, max: u16) -> u16 {
    value.round().clamp(f64::from(min), f64::from(max)) as u16
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
