//! Live device feeds
//!
//! A live feed pushes `LiveDeviceSample`s from real hardware. The merger
//! only depends on the `LiveDeviceFeed` trait; concrete feeds are injected
//! by the composition root.

#[cfg(unix)]
pub mod socket;

use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::channel::{Channel, SubscriptionId};
use crate::types::LiveDeviceSample;

#[cfg(unix)]
pub use socket::SocketFeed;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed device message: {0}")]
    Malformed(String),

    #[error("Feed already running")]
    AlreadyRunning,
}

/// A source of live device samples.
pub trait LiveDeviceFeed: Send + Sync {
    /// Begin producing samples.
    fn start(&self) -> Result<(), FeedError>;

    /// Stop producing samples. Idempotent.
    fn stop(&self);

    fn subscribe(&self, callback: Box<dyn Fn(&LiveDeviceSample) + Send + Sync>) -> SubscriptionId;

    fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool;
}

/// In-process feed: whatever is passed to `publish` goes to subscribers
/// while the feed is started.
pub struct LoopbackFeed {
    samples: Channel<LiveDeviceSample>,
    running: AtomicBool,
}

impl LoopbackFeed {
    pub fn new() -> Self {
        Self {
            samples: Channel::new("loopback_feed"),
            running: AtomicBool::new(false),
        }
    }

    /// Deliver a sample. Dropped (returns false) while the feed is stopped.
    pub fn publish(&self, sample: LiveDeviceSample) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            log::debug!("Loopback feed stopped; dropping sample");
            return false;
        }
        self.samples.publish(sample);
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveDeviceFeed for LoopbackFeed {
    fn start(&self) -> Result<(), FeedError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn subscribe(&self, callback: Box<dyn Fn(&LiveDeviceSample) + Send + Sync>) -> SubscriptionId {
        self.samples.subscribe(callback)
    }

    fn unsubscribe(&self, subscription_id: SubscriptionId) -> bool {
        self.samples.unsubscribe(subscription_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_loopback_only_delivers_while_started() {
        let feed = LoopbackFeed::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        feed.subscribe(Box::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!feed.publish(LiveDeviceSample::connected(80.0, 97.0, 98.4)));
        feed.start().unwrap();
        assert!(feed.publish(LiveDeviceSample::connected(80.0, 97.0, 98.4)));
        feed.stop();
        feed.stop();
        assert!(!feed.publish(LiveDeviceSample::disconnected()));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
