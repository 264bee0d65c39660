//! Main Store struct tying all components together.

use crate::error::{Result, StoreError};
use crate::handlers::{Handler, Registration};
use crate::state::StateTree;
use crate::subscriptions::{
    ChangeKind, StateChange, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
    SubscriptionManager,
};
use crate::transactions::{
    FailureSink, Invocation, LogSink, Outcome, Scheduler, TransactionFailure,
};
use crate::types::{Event, Phase, Sequence, TransactionId};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Event type dispatched once while the store boots.
pub const DEFAULT_INIT_EVENT: &str = "init";

/// Store configuration.
#[derive(Clone)]
pub struct StoreConfig {
    /// Event type of the synthetic boot dispatch.
    pub init_event: String,

    /// Receives every rolled-back transaction.
    pub failure_sink: Arc<dyn FailureSink>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            init_event: DEFAULT_INIT_EVENT.to_string(),
            failure_sink: Arc::new(LogSink),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("init_event", &self.init_event)
            .finish_non_exhaustive()
    }
}

/// The state store.
///
/// Holds one state tree and a static list of handlers. Dispatching an event
/// runs every handler registered for its type as a transaction over the
/// handler's declared paths:
/// - transactions on overlapping paths run one after another, in dispatch order
/// - transactions on disjoint paths run independently
/// - a failing reducer rolls its paths back to where they were before it ran
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,

    /// Handlers in registration order.
    handlers: Vec<Arc<Registration>>,

    /// The state tree.
    tree: RwLock<StateTree>,

    /// Held across a write and its broadcast so subscribers see changes in
    /// commit order.
    commit_order: Mutex<()>,

    /// Last committed sequence.
    sequence: AtomicU64,

    scheduler: Scheduler,

    subscriptions: SubscriptionManager,

    phase: RwLock<Phase>,
}

impl Store {
    /// Create a store with the default configuration.
    ///
    /// Completes once every handler registered for the init event has
    /// settled.
    pub async fn create(handlers: Vec<Handler>) -> Result<Self> {
        Self::with_config(handlers, StoreConfig::default()).await
    }

    /// Create a store.
    ///
    /// Handlers are validated before anything runs; a malformed handler fails
    /// creation. Must be called from within a tokio runtime, which is then
    /// used for every transaction of this store.
    pub async fn with_config(handlers: Vec<Handler>, config: StoreConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let handlers = handlers
            .into_iter()
            .map(|handler| {
                let event_type = handler.event_type().to_string();
                handler.register().map(Arc::new).map_err(|e| {
                    warn!(event_type = %event_type, error = %e, "rejected handler");
                    e
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let store = Store {
            inner: Arc::new(StoreInner {
                config,
                handlers,
                tree: RwLock::new(StateTree::new()),
                commit_order: Mutex::new(()),
                sequence: AtomicU64::new(0),
                scheduler: Scheduler::new(runtime),
                subscriptions: SubscriptionManager::new(),
                phase: RwLock::new(Phase::Booting),
            }),
        };

        let init = Event::new(store.inner.config.init_event.clone());
        let booted = store.dispatch(init);
        info!(
            handlers = store.inner.handlers.len(),
            init_transactions = booted,
            "store booting"
        );

        store.drain().await;
        *store.inner.phase.write() = Phase::Ready;
        info!(commits = store.last_sequence().0, "store ready");

        Ok(store)
    }

    // --- Dispatch ---

    /// Run every handler registered for `event.event_type`.
    ///
    /// Returns immediately with the number of transactions enqueued; their
    /// effects are observed through subscriptions, [`Store::get_state`], or
    /// [`Store::drain`]. Reducer failures never surface here.
    pub fn dispatch(&self, event: Event) -> usize {
        let Event {
            event_type,
            payload,
        } = event;

        let mut enqueued = 0;
        for registration in self
            .inner
            .handlers
            .iter()
            .filter(|h| h.event_type == event_type)
        {
            let inner = Arc::clone(&self.inner);
            let handler = Arc::clone(registration);
            let payload = payload.clone();

            self.inner.scheduler.enqueue(&registration.paths, move |id| {
                inner.run_transaction(id, handler, payload)
            });
            enqueued += 1;
        }

        if enqueued == 0 {
            debug!(event_type = %event_type, "no handlers for event");
        }
        enqueued
    }

    /// Wait until every transaction in flight at the time of the call has
    /// settled.
    pub async fn drain(&self) {
        self.inner.scheduler.drain().await;
    }

    // --- State ---

    /// Snapshot of the full state tree.
    pub fn get_state(&self) -> Value {
        self.inner.tree.read().snapshot()
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.read()
    }

    /// Sequence of the most recent write (0 before any write).
    pub fn last_sequence(&self) -> Sequence {
        Sequence(self.inner.sequence.load(Ordering::SeqCst))
    }

    /// Number of path claims whose transaction has not settled.
    pub fn pending_transactions(&self) -> usize {
        self.inner.scheduler.pending()
    }

    // --- Subscriptions ---

    /// Register a listener called after every write, including rollbacks.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.subscriptions.subscribe(listener);
    }

    /// Subscribe through a bounded channel.
    pub fn watch(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.inner.subscriptions.watch(config)
    }

    /// Remove a channel subscription.
    pub fn unwatch(&self, id: SubscriptionId) {
        self.inner.subscriptions.unwatch(id);
    }
}

impl StoreInner {
    async fn run_transaction(
        self: Arc<Self>,
        id: TransactionId,
        registration: Arc<Registration>,
        payload: Option<Value>,
    ) {
        let read = || self.tree.read().read(&registration.paths);
        let write = |value: Value, kind: ChangeKind| self.commit(id, &registration, value, kind);

        let outcome = Invocation::new(Arc::clone(&registration.reducer), payload, read, write)
            .run()
            .await;

        match outcome {
            Outcome::Committed { steps } => {
                debug!(
                    transaction = %id,
                    event_type = %registration.event_type,
                    steps,
                    "transaction committed"
                );
            }
            Outcome::RolledBack { steps, error } => {
                warn!(
                    transaction = %id,
                    event_type = %registration.event_type,
                    paths = %registration.paths,
                    steps_discarded = steps,
                    "transaction rolled back"
                );
                self.config.failure_sink.report(&TransactionFailure {
                    transaction: id,
                    event_type: registration.event_type.clone(),
                    paths: registration.paths.clone(),
                    steps_discarded: steps,
                    error,
                });
            }
        }
    }

    /// Apply one write and notify subscribers.
    fn commit(
        &self,
        transaction: TransactionId,
        registration: &Registration,
        value: Value,
        kind: ChangeKind,
    ) {
        let _order = self.commit_order.lock();

        let state = {
            let mut tree = self.tree.write();
            tree.write(&registration.paths, value);
            (!self.subscriptions.is_empty()).then(|| tree.snapshot())
        };

        let sequence = Sequence(self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(
            sequence = sequence.0,
            transaction = %transaction,
            kind = ?kind,
            "write committed"
        );

        if let Some(state) = state {
            self.subscriptions.broadcast(&StateChange {
                sequence,
                transaction,
                event_type: registration.event_type.clone(),
                paths: registration.paths.clone(),
                kind,
                state,
            });
        }
    }
}
