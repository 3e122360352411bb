//! types/vitals.rs
//!
//! Defines the VitalsReading struct produced by the simulator, its device and
//! data-quality descriptors, and the LiveDeviceSample pushed by a live sensor.

use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lowest heart rate the generator will emit (beats/min).
pub const HEART_RATE_MIN: u16 = 50;
/// Highest heart rate the generator will emit (beats/min).
pub const HEART_RATE_MAX: u16 = 120;
pub const SYSTOLIC_MIN: u16 = 90;
pub const SYSTOLIC_MAX: u16 = 180;
pub const DIASTOLIC_MIN: u16 = 60;
pub const DIASTOLIC_MAX: u16 = 110;
pub const OXYGEN_MIN: u8 = 92;
pub const OXYGEN_MAX: u8 = 100;
/// Body temperature bounds in °F.
pub const TEMPERATURE_MIN: f64 = 96.5;
pub const TEMPERATURE_MAX: f64 = 100.5;

/// Kind of device a reading came from.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Wristband,
    Smartwatch,
    MedicalDevice,
    ManualEntry,
}

/// Descriptor of the device that produced a reading.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub device_type: DeviceType,
    pub manufacturer: String,
    pub model: String,
    pub medical_grade: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certifications: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// The wearable the simulator pretends to be.
    pub fn simulated_wearable() -> Self {
        Self {
            id: "sim-wearable-001".to_string(),
            device_type: DeviceType::Smartwatch,
            manufacturer: "VitalSync".to_string(),
            model: "Pulse Watch S2".to_string(),
            medical_grade: true,
            certifications: vec!["FDA Class II".to_string(), "CE".to_string()],
            firmware_version: Some("2.4.1".to_string()),
        }
    }

    /// The ESP32 wristband behind the live device feed.
    pub fn live_wearable() -> Self {
        Self {
            id: "esp32-live".to_string(),
            device_type: DeviceType::Wristband,
            manufacturer: "Espressif".to_string(),
            model: "ESP32 vitals band".to_string(),
            medical_grade: false,
            certifications: Vec::new(),
            firmware_version: None,
        }
    }
}

/// Qualitative signal grade reported alongside a reading.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    /// Confidence in the measurement, 0.0 to 1.0
    pub confidence: f64,
    pub signal_quality: SignalQuality,
    pub artifacts_detected: bool,
}

impl Default for DataQuality {
    fn default() -> Self {
        Self {
            confidence: 1.0,
            signal_quality: SignalQuality::Excellent,
            artifacts_detected: false,
        }
    }
}

/// One vitals observation.
///
/// Readings are never mutated after construction; the merger builds new
/// values rather than editing the ones it received.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VitalsReading {
    pub id: String,
    pub heart_rate: u16,
    pub blood_pressure_systolic: u16,
    pub blood_pressure_diastolic: u16,
    pub oxygen_saturation: u8,
    /// Degrees Fahrenheit, one decimal place
    pub body_temperature: f64,
    /// Cumulative steps for the day
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    /// Presentation-only waveform, comma separated
    #[serde(default)]
    pub ecg_waveform: Option<String>,
    pub device: DeviceInfo,
    pub data_quality: DataQuality,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl VitalsReading {
    /// Fresh opaque reading id.
    pub fn new_id() -> String {
        format!("vitals-{}", Uuid::new_v4())
    }

    /// Plausible resting values shown before any data has arrived.
    pub fn resting_default() -> Self {
        let now = Utc::now();
        Self {
            id: "default".to_string(),
            heart_rate: 72,
            blood_pressure_systolic: 120,
            blood_pressure_diastolic: 80,
            oxygen_saturation: 98,
            body_temperature: 98.6,
            steps: Some(0),
            sleep_hours: Some(7.5),
            ecg_waveform: None,
            device: DeviceInfo::simulated_wearable(),
            data_quality: DataQuality::default(),
            timestamp: now,
            synced_at: Some(now),
        }
    }

    /// Whether every measurement lies inside the generator's clamping bounds.
    pub fn within_physiological_bounds(&self) -> bool {
        (HEART_RATE_MIN..=HEART_RATE_MAX).contains(&self.heart_rate)
            && (SYSTOLIC_MIN..=SYSTOLIC_MAX).contains(&self.blood_pressure_systolic)
            && (DIASTOLIC_MIN..=DIASTOLIC_MAX).contains(&self.blood_pressure_diastolic)
            && (OXYGEN_MIN..=OXYGEN_MAX).contains(&self.oxygen_saturation)
            && (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&self.body_temperature)
    }
}

/// The value shown to the dashboard. Same shape as a simulator reading.
pub type MergedVitals = VitalsReading;

/// A sample pushed by a live device (e.g. an ESP32 pulse-oximeter board).
///
/// Values are raw floats: the device can and does report NaN or -1 when a
/// sensor glitches, and the merger decides what to keep.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDeviceSample {
    pub heart_rate: f64,
    pub oxygen_saturation: f64,
    pub body_temperature: f64,
    pub is_connected: bool,
    pub timestamp: DateTime<Utc>,
}

impl LiveDeviceSample {
    pub fn connected(heart_rate: f64, oxygen_saturation: f64, body_temperature: f64) -> Self {
        Self {
            heart_rate,
            oxygen_saturation,
            body_temperature,
            is_connected: true,
            timestamp: Utc::now(),
        }
    }

    /// A sample announcing the device went away.
    pub fn disconnected() -> Self {
        Self {
            heart_rate: f64::NAN,
            oxygen_saturation: f64::NAN,
            body_temperature: f64::NAN,
            is_connected: false,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reading_is_in_bounds() {
        let reading = VitalsReading::resting_default();
        assert!(reading.within_physiological_bounds());
        assert_eq!(reading.heart_rate, 72);
    }

    #[test]
    fn test_reading_ids_are_unique() {
        assert_ne!(VitalsReading::new_id(), VitalsReading::new_id());
    }

    #[test]
    fn test_json_uses_dashboard_field_names() {
        let reading = VitalsReading::resting_default();
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["heartRate"], 72);
        assert_eq!(json["bloodPressureSystolic"], 120);
        assert_eq!(json["device"]["deviceType"], "smartwatch");
        assert_eq!(json["dataQuality"]["signalQuality"], "excellent");
    }

    #[test]
    fn test_out_of_bounds_detected() {
        let mut reading = VitalsReading::resting_default();
        reading.oxygen_saturation = 88;
        assert!(!reading.within_physiological_bounds());
    }
}
