//! channel.rs
//!
//! In-process pub/sub for readings and merged vitals.
//!
//! A `Channel<T>` holds the last published value and an ordered list of
//! subscriber callbacks. Publishing stores the value, pushes it on a tokio
//! broadcast channel for async consumers, and then invokes each callback in
//! registration order. A panicking callback is caught, logged and counted;
//! the remaining callbacks still run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identifies one registered callback.
pub type SubscriptionId = Uuid;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Channel<T: Send + Sync + Clone + 'static> {
    name: String,
    value: Mutex<Option<T>>,
    subscribers: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
    update_tx: broadcast::Sender<T>,
    faults: AtomicU64,
}

impl<T: Send + Sync + Clone + 'static> Channel<T> {
    pub fn new(name: &str) -> Self {
        let (update_tx, _) = broadcast::channel(32);
        Self {
            name: name.to_string(),
            value: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            update_tx,
            faults: AtomicU64::new(0),
        }
    }

    /// Create a channel that already holds a value.
    pub fn with_value(name: &str, initial_value: T) -> Self {
        let channel = Self::new(name);
        *lock(&channel.value) = Some(initial_value);
        channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last published value, if any.
    pub fn get_value(&self) -> Option<T> {
        lock(&self.value).clone()
    }

    /// Store `value` and deliver it to every subscriber.
    pub fn publish(&self, value: T) {
        *lock(&self.value) = Some(value.clone());
        // No receivers is fine
        let _ = self.update_tx.send(value.clone());
        self.notify(&value);
    }

    /// Deliver `value` to subscribers without replacing the stored value.
    pub fn notify(&self, value: &T) {
        // Snapshot so callbacks can subscribe/unsubscribe without deadlocking
        let callbacks: Vec<(SubscriptionId, Callback<T>)> = lock(&self.subscribers).clone();
        for (id, callback) in callbacks {
            self.invoke(id, &callback, value);
        }
    }

    fn invoke(&self, id: SubscriptionId, callback: &Callback<T>, value: &T) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| callback(value)));
        if result.is_err() {
            self.faults.fetch_add(1, Ordering::Relaxed);
            log::warn!("Subscriber {} on channel '{}' panicked; continuing", id, self.name);
        }
    }

    /// Register a callback for future values.
    pub fn subscribe(&self, callback: Box<dyn Fn(&T) + Send + Sync>) -> SubscriptionId {
        let id = Uuid::new_v4();
        lock(&self.subscribers).push((id, Arc::from(callback)));
        id
    }

    /// Register a callback and immediately hand it the current value, if any.
    pub fn subscribe_with_replay(&self, callback: Box<dyn Fn(&T) + Send + Sync>) -> SubscriptionId {
        let callback: Callback<T> = Arc::from(callback);
        let id = Uuid::new_v4();
        lock(&self.subscribers).push((id, Arc::clone(&callback)));
        if let Some(current) = self.get_value() {
            self.invoke(id, &callback, &current);
        }
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.subscribers);
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        subs.len() != before
    }

    pub fn clear(&self) {
        lock(&self.subscribers).clear();
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Receiver for async consumers. Lagging receivers lose old values.
    pub fn updates(&self) -> broadcast::Receiver<T> {
        self.update_tx.subscribe()
    }

    /// Number of callback invocations that panicked.
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }
}
