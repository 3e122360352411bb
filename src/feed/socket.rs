//! Unix-socket live feed for an ESP32 pulse-oximeter bridge.
//!
//! The bridge process writes one JSON object per line:
//!
//! ```text
//! {"heartRate": 78, "spo2": 97, "temperature": 98.2, "timestamp": "2024-05-01T10:00:00Z"}
//! ```
//!
//! Missing measurements become NaN so the merger keeps its previous value
//! for them. When the bridge disconnects a disconnected sample is published.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

use super::{FeedError, LiveDeviceFeed};
use crate::channel::{lock, Channel, SubscriptionId};
use crate::types::LiveDeviceSample;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/vitalsync_device.sock";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceMessage {
    #[serde(alias = "bpm")]
    heart_rate: Option<f64>,
    #[serde(alias = "oxygenSaturation")]
    spo2: Option<f64>,
    /// Fahrenheit
    #[serde(alias = "temperatureF", alias = "bodyTemperature")]
    temperature: Option<f64>,
    temperature_c: Option<f64>,
    connected: Option<bool>,
    timestamp: Option<String>,
}

/// Parse one line from the device bridge.
pub fn parse_device_line(line: &str) -> Result<LiveDeviceSample, FeedError> {
    let message: DeviceMessage =
        serde_json::from_str(line.trim()).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let timestamp = match &message.timestamp {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| FeedError::Malformed(format!("bad timestamp '{}': {}", raw, e)))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let body_temperature = message
        .temperature
        .or_else(|| message.temperature_c.map(|c| c * 9.0 / 5.0 + 32.0))
        .unwrap_or(f64::NAN);

    Ok(LiveDeviceSample {
        heart_rate: message.heart_rate.unwrap_or(f64::NAN),
        oxygen_saturation: message.spo2.unwrap_or(f64::NAN),
        body_temperature,
        is_connected: message.connected.unwrap_or(true),
        timestamp,
    })
}

pub struct SocketFeed {
    path: PathBuf,
    samples: Arc<Channel<LiveDeviceSample>>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            samples: Arc::new(Channel::new("socket_feed")),
            listener_task: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn serve(listener: UnixListener, samples: Arc<Channel<LiveDeviceSample>>) {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    log::warn!("Failed to accept device connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            };
            log::info!("Device bridge connected");

            let mut lines = BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match parse_device_line(&line) {
                        Ok(sample) => samples.publish(sample),
                        Err(e) => log::warn!("Skipping device message: {}", e),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("Device connection error: {}", e);
                        break;
                    }
                }
            }

            log::info!("Device bridge disconnected");
            samples.publish(LiveDeviceSample::disconnected());
        }
    }
}

impl LiveDeviceFeed for SocketFeed {
    /// Bind the socket and spawn the listener. Requires a tokio runtime.
    fn start(&self) -> Result<(), FeedError> {
        let mut task = lock(&self.listener_task);
        if task.as_ref().map_or(false, |t| !t.is_finished()) {
            return Err(FeedError::AlreadyRunning);
        }

        // A stale socket file from a previous run blocks bind
        let _ = std::fs::remove_file(&self.path);
        let listener = UnixListener::bind(&self.path)?;
        log::info!("Listening for device data on {}", self.path.display());

        *task = Some(tokio::spawn(Self::serve(listener, Arc::clone(&self.samples))));
        Ok(())
    }

    fn stop(&self) {
        if let Some(task) = lock(&self.listener_task).take() {
            task.abort();
            let _ = std::fs::remove_file(&self.path);
            self.samples.publish(LiveDeviceSample::disconnected());
            log::info!("Device feed stopped");
        }
    }

    fn subscribe(&self, callback: Box<dyn Fn(&LiveDeviceSample) + Send + Sync>) -> SubscriptionId {
        self.samples.subscribe(callback)
    }

    fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool {
        self.samples.unsubscribe(subscription_id)
    }
}

impl Drop for SocketFeed {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.listener_task).take() {
            task.abort();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_full_message() {
        let sample = parse_device_line(
            r#"{"heartRate": 78, "spo2": 97, "temperature": 98.2, "timestamp": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(sample.heart_rate, 78.0);
        assert_eq!(sample.oxygen_saturation, 97.0);
        assert_eq!(sample.body_temperature, 98.2);
        assert!(sample.is_connected);
        assert_eq!(sample.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_partial_message_and_celsius() {
        let sample = parse_device_line(r#"{"bpm": 81, "temperatureC": 37.0}"#).unwrap();
        assert_eq!(sample.heart_rate, 81.0);
        assert!(sample.oxygen_saturation.is_nan());
        assert!((sample.body_temperature - 98.6).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_device_line("hello"), Err(FeedError::Malformed(_))));
        assert!(matches!(
            parse_device_line(r#"{"bpm": 70, "timestamp": "yesterday"}"#),
            Err(FeedError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.sock");
        let feed = SocketFeed::new(&path);

        let (tx, mut rx) = mpsc::unbounded_channel();
        feed.subscribe(Box::new(move |sample| {
            let _ = tx.send(sample.clone());
        }));
        feed.start().unwrap();
        assert!(matches!(feed.start(), Err(FeedError::AlreadyRunning)));

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream
            .write_all(b"not json\n{\"heartRate\": 88, \"spo2\": 96, \"temperature\": 98.9}\n")
            .await
            .unwrap();

        let sample = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sample.heart_rate, 88.0);
        assert!(sample.is_connected);

        drop(stream);
        let after_disconnect = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!after_disconnect.is_connected);

        feed.stop();
    }
}
