//! Subscription system for state changes.
//!
//! Every committed write, whether a reducer step or a rollback, is
//! broadcast as a [`StateChange`] carrying the full tree snapshot taken with
//! the write. Two kinds of subscriber exist:
//! - Callback listeners, registered for the lifetime of the store
//! - Channel subscriptions with bounded buffers and slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//!
//! manager.subscribe(|change| println!("#{:?}: {}", change.sequence, change.state));
//!
//! let handle = manager.watch(SubscriptionConfig::default());
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Changed(change)) => println!("{:?}", change.kind),
//!         Ok(StoreEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    ChangeKind, DropReason, Listener, StateChange, StoreEvent, SubscriptionConfig,
    SubscriptionHandle, SubscriptionId,
};
