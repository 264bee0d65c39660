//! # Subtree Store
//!
//! A single state tree mutated by many independent handlers, each scoped to
//! the subtrees it declares.
//!
//! ## Core Concepts
//!
//! - **Paths**: dotted keys naming a subtree; `""` is the whole tree
//! - **Handlers**: an event type, a set of paths, and a reducer
//! - **Transactions**: one reducer run for one event; overlapping paths run in
//!   dispatch order, disjoint paths run independently
//! - **Reductions**: plain, deferred, or incremental results, each step
//!   written as it arrives and rolled back as a whole on failure
//!
//! ## Example
//!
//! ```ignore
//! use subtree_store::{Event, Handler, Reduction, Store};
//! use serde_json::json;
//!
//! let store = Store::create(vec![
//!     Handler::new("init", [""], |_, _| json!({"a": 0, "b": 0})),
//!     Handler::new("bump", ["a"], |state, _| {
//!         let a = state["a"].as_i64().unwrap_or(0);
//!         Reduction::deferred(async move { json!({"a": a + 1}) })
//!     }),
//! ])
//! .await?;
//!
//! store.subscribe(|change| println!("{}", change.state));
//! store.dispatch(Event::new("bump"));
//! ```

pub mod error;
pub mod handlers;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod transactions;
pub mod types;

// Re-exports
pub use error::{BoxError, Result, StoreError};
pub use handlers::Handler;
pub use state::StateTree;
pub use store::{Store, StoreConfig, DEFAULT_INIT_EVENT};
pub use subscriptions::{
    ChangeKind, DropReason, StateChange, StoreEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use transactions::{
    FailureSink, Invocation, LogSink, Outcome, Reducer, Reduction, Scheduler, StepStream,
    TransactionFailure,
};
pub use types::*;
