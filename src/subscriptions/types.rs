//! Subscription types for state change notifications.

use crate::types::{PathSet, Sequence, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Why a write happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A value produced by a reducer.
    Step,
    /// The pre-invocation snapshot written back after a reducer failed.
    Rollback,
}

/// One committed write, as seen by subscribers.
#[derive(Clone, Debug)]
pub struct StateChange {
    /// Store-wide commit number, starting at 1.
    pub sequence: Sequence,
    pub transaction: TransactionId,
    /// Event type that triggered the transaction.
    pub event_type: String,
    /// Paths the write was scoped to.
    pub paths: PathSet,
    pub kind: ChangeKind,
    /// Full tree right after the write.
    pub state: Value,
}

/// Callback invoked after every write.
pub type Listener = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Configuration for a channel subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping the subscriber.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Events delivered to channel subscribers.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    /// A write was committed.
    Changed(StateChange),
    /// Subscription was dropped; nothing further will arrive.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to a channel subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// All changes buffered right now, in commit order.
    pub fn ready_changes(&self) -> Vec<StateChange> {
        self.receiver
            .try_iter()
            .filter_map(|event| match event {
                StoreEvent::Changed(change) => Some(change),
                StoreEvent::Dropped { .. } => None,
            })
            .collect()
    }
}
