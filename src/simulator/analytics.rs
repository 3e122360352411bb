//! Derived views over readings: health score, insights, tick-time anomalies,
//! windowed summaries and the mock device status.
//!
//! Two rule sets live here on purpose. `health_insights` produces the alert
//! strings shown with the current reading; `detect_anomalies` is the detector
//! run on every tick. Their thresholds differ and are kept separate.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Serialize, Deserialize};

use super::history::{Trend, TrendSnapshot};
use crate::types::VitalsReading;

const WEIGHT_HEART_RATE: f64 = 0.20;
const WEIGHT_BLOOD_PRESSURE: f64 = 0.25;
const WEIGHT_OXYGEN: f64 = 0.20;
const WEIGHT_TEMPERATURE: f64 = 0.15;
const WEIGHT_CONFIDENCE: f64 = 0.10;
const WEIGHT_STABILITY: f64 = 0.10;

pub const HIGH_BLOOD_PRESSURE_ALERT: &str = "High blood pressure detected";
pub const HIGH_HEART_RATE_ALERT: &str = "Heart rate is above 120 bpm";
pub const LOW_OXYGEN_ALERT: &str = "Low oxygen saturation detected";

fn heart_rate_score(heart_rate: u16) -> f64 {
    match heart_rate {
        60..=100 => 100.0,
        50..=120 => 70.0,
        _ => 40.0,
    }
}

fn blood_pressure_score(systolic: u16, diastolic: u16) -> f64 {
    if systolic <= 120 && diastolic <= 80 {
        100.0
    } else if systolic <= 140 && diastolic <= 90 {
        70.0
    } else {
        40.0
    }
}

fn oxygen_score(oxygen: u8) -> f64 {
    match oxygen {
        95..=u8::MAX => 100.0,
        90..=94 => 70.0,
        _ => 40.0,
    }
}

fn temperature_score(temperature: f64) -> f64 {
    if (97.0..=99.5).contains(&temperature) {
        100.0
    } else {
        60.0
    }
}

fn stability_score(trends: &TrendSnapshot) -> f64 {
    if !trends.is_sufficient() {
        return 80.0;
    }
    let unstable = [trends.heart_rate_trend(), trends.systolic_trend()]
        .iter()
        .filter(|t| **t != Trend::Stable)
        .count();
    match unstable {
        0 => 100.0,
        1 => 70.0,
        _ => 50.0,
    }
}

/// Weighted 0-100 composite of the reading and the trend window.
pub fn calculate_health_score(reading: &VitalsReading, trends: &TrendSnapshot) -> u8 {
    let score = heart_rate_score(reading.heart_rate) * WEIGHT_HEART_RATE
        + blood_pressure_score(reading.blood_pressure_systolic, reading.blood_pressure_diastolic)
            * WEIGHT_BLOOD_PRESSURE
        + oxygen_score(reading.oxygen_saturation) * WEIGHT_OXYGEN
        + temperature_score(reading.body_temperature) * WEIGHT_TEMPERATURE
        + reading.data_quality.confidence.clamp(0.0, 1.0) * 100.0 * WEIGHT_CONFIDENCE
        + stability_score(trends) * WEIGHT_STABILITY;

    score.round().clamp(0.0, 100.0) as u8
}

/// Trend labels reported with insights.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsightTrends {
    pub heart_rate: Trend,
    pub blood_pressure: Trend,
    pub oxygen_saturation: Trend,
}

impl InsightTrends {
    fn from_snapshot(trends: &TrendSnapshot) -> Self {
        if !trends.is_sufficient() {
            return Self::default();
        }
        Self {
            heart_rate: trends.heart_rate_trend(),
            blood_pressure: trends.systolic_trend(),
            oxygen_saturation: trends.oxygen_trend(),
        }
    }
}

impl Default for InsightTrends {
    fn default() -> Self {
        Self {
            heart_rate: Trend::Stable,
            blood_pressure: Trend::Stable,
            oxygen_saturation: Trend::Stable,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthInsights {
    pub health_score: u8,
    pub trends: InsightTrends,
    pub recommendations: Vec<String>,
    pub alerts: Vec<String>,
}

impl HealthInsights {
    /// Insights before any reading exists.
    pub fn empty() -> Self {
        Self {
            health_score: 0,
            trends: InsightTrends::default(),
            recommendations: Vec::new(),
            alerts: Vec::new(),
        }
    }
}

pub fn health_insights(reading: &VitalsReading, trends: &TrendSnapshot) -> HealthInsights {
    let mut recommendations = Vec::new();
    if reading.heart_rate > 90 {
        recommendations
            .push("Consider relaxation techniques or light rest to lower your heart rate".to_string());
    }
    if reading.blood_pressure_systolic > 130 {
        recommendations.push("Monitor sodium intake and keep an eye on blood pressure".to_string());
    }
    if reading.steps.map_or(false, |steps| steps < 8_000) {
        recommendations.push("Try to increase daily activity towards 8,000+ steps".to_string());
    }
    if reading.sleep_hours.map_or(false, |hours| hours < 7.0) {
        recommendations.push("Aim for 7-9 hours of sleep for better recovery".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Your vitals look great, keep up the healthy habits".to_string());
        recommendations.push("Stay hydrated and maintain your current routine".to_string());
    }

    let mut alerts = Vec::new();
    if reading.heart_rate > 120 {
        alerts.push(HIGH_HEART_RATE_ALERT.to_string());
    }
    if reading.blood_pressure_systolic > 140 || reading.blood_pressure_diastolic > 90 {
        alerts.push(HIGH_BLOOD_PRESSURE_ALERT.to_string());
    }
    if reading.oxygen_saturation < 92 {
        alerts.push(LOW_OXYGEN_ALERT.to_string());
    }

    HealthInsights {
        health_score: calculate_health_score(reading, trends),
        trends: InsightTrends::from_snapshot(trends),
        recommendations,
        alerts,
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Tachycardia,
    Bradycardia,
    Hypertension,
    Desaturation,
    Fever,
    Hypothermia,
    RisingHeartRate,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// One finding of the tick-time detector.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub message: String,
    pub reading_id: String,
    pub detected_at: DateTime<Utc>,
}

/// Tick-time anomaly detector.
pub fn detect_anomalies(reading: &VitalsReading, trends: &TrendSnapshot) -> Vec<Anomaly> {
    let mut found: Vec<(AnomalyKind, Severity, String)> = Vec::new();

    if reading.heart_rate > 100 {
        found.push((
            AnomalyKind::Tachycardia,
            Severity::Warning,
            format!("Elevated heart rate: {} bpm", reading.heart_rate),
        ));
    } else if reading.heart_rate < 55 {
        found.push((
            AnomalyKind::Bradycardia,
            Severity::Warning,
            format!("Low heart rate: {} bpm", reading.heart_rate),
        ));
    }

    if reading.blood_pressure_systolic >= 140 || reading.blood_pressure_diastolic >= 90 {
        let severity = if reading.blood_pressure_systolic >= 160 {
            Severity::Critical
        } else {
            Severity::Warning
        };
        found.push((
            AnomalyKind::Hypertension,
            severity,
            format!(
                "Blood pressure {}/{} mmHg",
                reading.blood_pressure_systolic, reading.blood_pressure_diastolic
            ),
        ));
    }

    if reading.oxygen_saturation < 95 {
        let severity = if reading.oxygen_saturation < 92 {
            Severity::Critical
        } else {
            Severity::Warning
        };
        found.push((
            AnomalyKind::Desaturation,
            severity,
            format!("Oxygen saturation {}%", reading.oxygen_saturation),
        ));
    }

    if reading.body_temperature > 99.5 {
        found.push((
            AnomalyKind::Fever,
            Severity::Warning,
            format!("Body temperature {:.1}°F", reading.body_temperature),
        ));
    } else if reading.body_temperature < 97.0 {
        found.push((
            AnomalyKind::Hypothermia,
            Severity::Info,
            format!("Body temperature {:.1}°F", reading.body_temperature),
        ));
    }

    if trends.heart_rate_trend() == Trend::Increasing && reading.heart_rate > 90 {
        found.push((
            AnomalyKind::RisingHeartRate,
            Severity::Info,
            "Heart rate has been climbing over recent readings".to_string(),
        ));
    }

    let detected_at = Utc::now();
    found
        .into_iter()
        .map(|(kind, severity, message)| Anomaly {
            kind,
            severity,
            message,
            reading_id: reading.id.clone(),
            detected_at,
        })
        .collect()
}

/// Per-metric means over a summary window.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricAverages {
    pub heart_rate: f64,
    pub blood_pressure_systolic: f64,
    pub blood_pressure_diastolic: f64,
    pub oxygen_saturation: f64,
    pub body_temperature: f64,
}

impl MetricAverages {
    /// `None` for an empty window.
    pub fn over(window: &[VitalsReading]) -> Option<Self> {
        if window.is_empty() {
            return None;
        }
        let n = window.len() as f64;
        let mean = |f: fn(&VitalsReading) -> f64| window.iter().map(f).sum::<f64>() / n;
        Some(Self {
            heart_rate: mean(|r| f64::from(r.heart_rate)),
            blood_pressure_systolic: mean(|r| f64::from(r.blood_pressure_systolic)),
            blood_pressure_diastolic: mean(|r| f64::from(r.blood_pressure_diastolic)),
            oxygen_saturation: mean(|r| f64::from(r.oxygen_saturation)),
            body_temperature: mean(|r| r.body_temperature),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSummary {
    pub current: Option<VitalsReading>,
    /// Most recent entries, newest first
    pub window: Vec<VitalsReading>,
    pub averages: Option<MetricAverages>,
    pub total_data_points: usize,
}

/// Randomised connectivity descriptor. Not derived from any real state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub connected: bool,
    /// Percent
    pub battery_level: u8,
    /// Percent
    pub signal_strength: u8,
    pub last_sync: DateTime<Utc>,
}

impl DeviceStatus {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            connected: rng.gen_bool(0.95),
            battery_level: rng.gen_range(20..=100),
            signal_strength: rng.gen_range(60..=100),
            last_sync: Utc::now() - Duration::seconds(rng.gen_range(0..300)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::history::HistoryBuffer;

    fn normal_reading() -> VitalsReading {
        VitalsReading {
            heart_rate: 72,
            blood_pressure_systolic: 118,
            blood_pressure_diastolic: 76,
            oxygen_saturation: 98,
            body_temperature: 98.4,
            steps: Some(9_500),
            sleep_hours: Some(7.5),
            ..VitalsReading::resting_default()
        }
    }

    fn snapshot_of(heart_rates: &[u16], systolics: &[u16]) -> TrendSnapshot {
        let mut history = HistoryBuffer::new(10);
        for (hr, sys) in heart_rates.iter().zip(systolics) {
            history.push(VitalsReading {
                heart_rate: *hr,
                blood_pressure_systolic: *sys,
                ..normal_reading()
            });
        }
        TrendSnapshot::from_history(&history, 5)
    }

    #[test]
    fn test_perfect_reading_scores_high() {
        let reading = normal_reading();
        let stable = snapshot_of(&[72, 72, 72], &[118, 118, 118]);
        assert_eq!(calculate_health_score(&reading, &stable), 100);

        // Insufficient history gives the 80-point stability default
        assert_eq!(calculate_health_score(&reading, &TrendSnapshot::default()), 98);
    }

    #[test]
    fn test_stability_component() {
        let reading = normal_reading();
        let one_unstable = snapshot_of(&[60, 65, 72], &[118, 118, 118]);
        let both_unstable = snapshot_of(&[60, 65, 72], &[100, 110, 118]);
        assert_eq!(calculate_health_score(&reading, &one_unstable), 97);
        assert_eq!(calculate_health_score(&reading, &both_unstable), 95);
    }

    #[test]
    fn test_poor_reading_scores_low_and_bounded() {
        let reading = VitalsReading {
            heart_rate: 130,
            blood_pressure_systolic: 170,
            blood_pressure_diastolic: 105,
            oxygen_saturation: 85,
            body_temperature: 101.2,
            ..normal_reading()
        };
        let score = calculate_health_score(&reading, &TrendSnapshot::default());
        // 8 + 10 + 8 + 9 + 10 + 8
        assert_eq!(score, 53);
        assert!(score <= 100);
    }

    #[test]
    fn test_score_is_deterministic() {
        let reading = normal_reading();
        let trends = snapshot_of(&[70, 75, 80], &[120, 121, 119]);
        let first = calculate_health_score(&reading, &trends);
        for _ in 0..10 {
            assert_eq!(calculate_health_score(&reading, &trends), first);
        }
    }

    #[test]
    fn test_normal_reading_has_no_alerts() {
        let insights = health_insights(&normal_reading(), &TrendSnapshot::default());
        assert!(insights.alerts.is_empty());
        assert_eq!(insights.recommendations.len(), 2);
        assert_eq!(insights.trends, InsightTrends::default());
    }

    #[test]
    fn test_high_blood_pressure_alert() {
        let reading = VitalsReading {
            blood_pressure_systolic: 150,
            ..normal_reading()
        };
        let insights = health_insights(&reading, &TrendSnapshot::default());
        assert_eq!(insights.alerts, vec![HIGH_BLOOD_PRESSURE_ALERT.to_string()]);

        let diastolic_only = VitalsReading {
            blood_pressure_diastolic: 95,
            ..normal_reading()
        };
        let insights = health_insights(&diastolic_only, &TrendSnapshot::default());
        assert!(insights.alerts.iter().any(|a| a.contains("High blood pressure")));
    }

    #[test]
    fn test_alerts_accumulate_independently() {
        let reading = VitalsReading {
            heart_rate: 130,
            blood_pressure_systolic: 150,
            oxygen_saturation: 90,
            ..normal_reading()
        };
        let insights = health_insights(&reading, &TrendSnapshot::default());
        assert_eq!(insights.alerts.len(), 3);
    }

    #[test]
    fn test_recommendation_rules() {
        let reading = VitalsReading {
            heart_rate: 95,
            blood_pressure_systolic: 135,
            steps: Some(3_000),
            sleep_hours: Some(5.5),
            ..normal_reading()
        };
        let insights = health_insights(&reading, &TrendSnapshot::default());
        assert_eq!(insights.recommendations.len(), 4);
        assert!(insights.recommendations[0].contains("heart rate"));
        assert!(insights.recommendations[1].contains("sodium"));
    }

    #[test]
    fn test_anomaly_detector_is_separate_from_alerts() {
        // 105 bpm: no insights alert, but the tick detector flags it
        let reading = VitalsReading {
            heart_rate: 105,
            ..normal_reading()
        };
        assert!(health_insights(&reading, &TrendSnapshot::default()).alerts.is_empty());

        let anomalies = detect_anomalies(&reading, &TrendSnapshot::default());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Tachycardia);
        assert_eq!(anomalies[0].reading_id, reading.id);
    }

    #[test]
    fn test_anomaly_severity() {
        let reading = VitalsReading {
            blood_pressure_systolic: 165,
            oxygen_saturation: 93,
            ..normal_reading()
        };
        let anomalies = detect_anomalies(&reading, &TrendSnapshot::default());
        let hypertension = anomalies.iter().find(|a| a.kind == AnomalyKind::Hypertension).unwrap();
        assert_eq!(hypertension.severity, Severity::Critical);
        let desaturation = anomalies.iter().find(|a| a.kind == AnomalyKind::Desaturation).unwrap();
        assert_eq!(desaturation.severity, Severity::Warning);
        assert!(detect_anomalies(&normal_reading(), &TrendSnapshot::default()).is_empty());
    }

    #[test]
    fn test_rising_heart_rate_anomaly() {
        let rising = snapshot_of(&[76, 82, 88, 94], &[118, 118, 118, 118]);
        assert_eq!(rising.heart_rate_trend(), Trend::Increasing);

        let reading = VitalsReading {
            heart_rate: 94,
            ..normal_reading()
        };
        let anomalies = detect_anomalies(&reading, &rising);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::RisingHeartRate);
        assert_eq!(anomalies[0].severity, Severity::Info);

        // Rising but still below 90 bpm
        let calm = snapshot_of(&[70, 76, 82, 86], &[118, 118, 118, 118]);
        let reading = VitalsReading {
            heart_rate: 86,
            ..normal_reading()
        };
        assert!(detect_anomalies(&reading, &calm).is_empty());
    }

    #[test]
    fn test_averages() {
        assert!(MetricAverages::over(&[]).is_none());
        let window = vec![
            VitalsReading { heart_rate: 70, ..normal_reading() },
            VitalsReading { heart_rate: 80, ..normal_reading() },
        ];
        let averages = MetricAverages::over(&window).unwrap();
        assert_eq!(averages.heart_rate, 75.0);
        assert_eq!(averages.oxygen_saturation, 98.0);
    }

    #[test]
    fn test_device_status_ranges() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let status = DeviceStatus::random(&mut rng);
            assert!((20..=100).contains(&status.battery_level));
            assert!((60..=100).contains(&status.signal_strength));
            assert!(status.last_sync <= Utc::now());
        }
    }
}
