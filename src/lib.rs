// VitalSync - Simulated wearable vitals with live device overlay

pub mod analysis;
pub mod channel;
pub mod config;
pub mod feed;
pub mod merge;
pub mod simulator;
pub mod types;

pub use channel::{Channel, SubscriptionId};
pub use config::{ConfigError, SimulatorConfig};
pub use feed::{FeedError, LiveDeviceFeed, LoopbackFeed};
pub use merge::{LiveFeedMerger, MergeLinks};
pub use simulator::VitalsSimulator;
pub use types::{LiveDeviceSample, MergedVitals, VitalsReading};
