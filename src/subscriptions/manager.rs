//! Subscription manager for broadcasting state changes.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

use crate::error::panic_message;

use super::types::{
    DropReason, Listener, StateChange, StoreEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};

/// Manages listeners and channel subscriptions, and broadcasts changes.
pub struct SubscriptionManager {
    /// Callback listeners. Only ever grows.
    listeners: RwLock<Vec<Listener>>,
    /// Channel subscriptions by ID.
    watchers: RwLock<HashMap<SubscriptionId, Sender<StoreEvent>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            watchers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback invoked after every write.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Create a channel subscription.
    pub fn watch(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.watchers.write().insert(id, sender);

        SubscriptionHandle { id, receiver }
    }

    /// Remove a channel subscription.
    pub fn unwatch(&self, id: SubscriptionId) {
        if let Some(sender) = self.watchers.write().remove(&id) {
            // Send dropped event (best effort)
            let _ = sender.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// True when nobody would observe a broadcast.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty() && self.watchers.read().is_empty()
    }

    /// Deliver a change to every listener and watcher. Drops watchers that
    /// fail to receive.
    ///
    /// A panicking listener is logged and skipped; it stays subscribed and
    /// the remaining listeners still run.
    pub fn broadcast(&self, change: &StateChange) {
        // Listeners may subscribe from inside the callback.
        let listeners: Vec<Listener> = self.listeners.read().clone();
        for (index, listener) in listeners.iter().enumerate() {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener(change))) {
                error!(
                    listener = index,
                    sequence = change.sequence.0,
                    panic = %panic_message(panic.as_ref()),
                    "listener panicked"
                );
            }
        }

        let mut to_remove = Vec::new();

        {
            let watchers = self.watchers.read();
            for (id, sender) in watchers.iter() {
                if sender.try_send(StoreEvent::Changed(change.clone())).is_err() {
                    to_remove.push(*id);
                }
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut watchers = self.watchers.write();
            for id in to_remove {
                if let Some(sender) = watchers.remove(&id) {
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sender.try_send(StoreEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::ChangeKind;
    use crate::types::{PathSet, Sequence, TransactionId};
    use serde_json::json;
    use std::time::Duration;

    fn make_change(sequence: u64) -> StateChange {
        StateChange {
            sequence: Sequence(sequence),
            transaction: TransactionId(1),
            event_type: "increment".to_string(),
            paths: PathSet::root(),
            kind: ChangeKind::Step,
            state: json!(sequence),
        }
    }

    #[test]
    fn test_listener_receives_changes() {
        let manager = SubscriptionManager::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        let sink = Arc::clone(&seen);
        manager.subscribe(move |change| sink.write().push(change.sequence));

        manager.broadcast(&make_change(1));
        manager.broadcast(&make_change(2));

        assert_eq!(*seen.read(), vec![Sequence(1), Sequence(2)]);
        assert_eq!(manager.listener_count(), 1);
    }

    #[test]
    fn test_watch_unwatch() {
        let manager = SubscriptionManager::new();
        assert!(manager.is_empty());

        let handle = manager.watch(SubscriptionConfig::default());
        assert_eq!(manager.watcher_count(), 1);

        manager.broadcast(&make_change(1));
        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(event, StoreEvent::Changed(change) if change.sequence == Sequence(1)));

        manager.unwatch(handle.id);
        assert_eq!(manager.watcher_count(), 0);
        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert!(matches!(
            event,
            StoreEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        ));
    }

    #[test]
    fn test_drop_slow_subscriber() {
        // Small buffer
        let manager = SubscriptionManager::new();
        let handle = manager.watch(SubscriptionConfig { buffer_size: 2 });

        // Flood with events
        for i in 0..10 {
            manager.broadcast(&make_change(i));
        }

        // Subscriber should be dropped
        assert_eq!(manager.watcher_count(), 0);
        assert_eq!(handle.ready_changes().len(), 2);
    }

    #[test]
    fn test_disconnected_watcher_is_dropped() {
        let manager = SubscriptionManager::new();
        let handle = manager.watch(SubscriptionConfig::default());
        drop(handle);

        manager.broadcast(&make_change(1));
        assert_eq!(manager.watcher_count(), 0);
    }

    #[test]
    fn test_listener_may_subscribe_during_broadcast() {
        let manager = Arc::new(SubscriptionManager::new());

        let inner = Arc::clone(&manager);
        manager.subscribe(move |_| inner.subscribe(|_| {}));

        manager.broadcast(&make_change(1));
        assert_eq!(manager.listener_count(), 2);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_broadcast() {
        let manager = SubscriptionManager::new();
        let seen = Arc::new(RwLock::new(Vec::new()));

        manager.subscribe(|change| {
            if change.sequence == Sequence(1) {
                panic!("listener bug");
            }
        });
        let sink = Arc::clone(&seen);
        manager.subscribe(move |change| sink.write().push(change.sequence));
        let handle = manager.watch(SubscriptionConfig::default());

        manager.broadcast(&make_change(1));
        manager.broadcast(&make_change(2));

        assert_eq!(*seen.read(), vec![Sequence(1), Sequence(2)]);
        assert_eq!(handle.ready_changes().len(), 2);
        assert_eq!(manager.listener_count(), 2);
    }
}
