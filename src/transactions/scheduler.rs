//! Conflict-ordered transaction scheduling over tree paths.

use crate::types::{Path, PathSet, TransactionId};
use futures::channel::oneshot;
use futures::future::{join_all, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::debug;

/// Resolves once the transaction's task has finished, successfully or not.
///
/// Only the spawned task drives the transaction; this is a signal fired at
/// its end. A dropped sender (the task panicked or was cancelled) counts as
/// settled.
type Completion = Shared<oneshot::Receiver<()>>;

fn settled(done: &Completion) -> bool {
    done.peek().is_some() || done.clone().now_or_never().is_some()
}

/// Latest claimant per path.
#[derive(Default)]
struct Ledger {
    claims: HashMap<Path, Completion>,
    /// Transactions that declared no paths. They conflict with nothing but
    /// still count for [`Scheduler::drain`].
    unscoped: Vec<Completion>,
}

impl Ledger {
    /// Forget transactions that already settled. They can no longer make
    /// anyone wait.
    fn prune(&mut self) {
        self.claims.retain(|_, done| !settled(done));
        self.unscoped.retain(|done| !settled(done));
    }

    fn conflicts(&self, paths: &PathSet) -> Vec<Completion> {
        self.claims
            .iter()
            .filter(|(claimed, _)| paths.conflicts_with(claimed))
            .map(|(_, done)| done.clone())
            .collect()
    }

    fn claim(&mut self, paths: &PathSet, completion: &Completion) {
        if paths.is_empty() {
            self.unscoped.push(completion.clone());
            return;
        }
        for path in paths {
            self.claims.insert(path.clone(), completion.clone());
        }
    }

    fn pending(&self) -> Vec<Completion> {
        self.claims
            .values()
            .chain(self.unscoped.iter())
            .filter(|done| !settled(done))
            .cloned()
            .collect()
    }
}

/// Runs units of work so that any two whose paths overlap execute in the
/// order they were enqueued, while disjoint ones proceed independently.
///
/// Two paths overlap when one is an ancestor of (or equal to) the other.
/// The root path therefore overlaps with everything.
pub struct Scheduler {
    ledger: Mutex<Ledger>,
    next_id: AtomicU64,
    runtime: Handle,
}

impl Scheduler {
    /// Create a scheduler that spawns onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            ledger: Mutex::new(Ledger::default()),
            next_id: AtomicU64::new(1),
            runtime,
        }
    }

    /// Register a unit of work touching `paths`.
    ///
    /// The unit starts only after every transaction currently claiming an
    /// overlapping path has settled, and then becomes the claimant of each
    /// of its own paths. Conflict computation and claiming happen under one
    /// lock, so concurrent enqueues cannot race.
    pub fn enqueue<U, F>(&self, paths: &PathSet, unit: U) -> TransactionId
    where
        U: FnOnce(TransactionId) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        let id = TransactionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let work = unit(id);
        let (finished, completion) = oneshot::channel::<()>();
        let completion = completion.shared();

        let waits = {
            let mut ledger = self.ledger.lock();
            ledger.prune();

            let waits = ledger.conflicts(paths);
            debug!(transaction = %id, paths = %paths, waits = waits.len(), "enqueue transaction");

            ledger.claim(paths, &completion);
            waits
        };

        self.runtime.spawn(async move {
            join_all(waits).await;
            work.await;
            let _ = finished.send(());
        });
        id
    }

    /// Wait for every transaction registered at the time of the call.
    pub async fn drain(&self) {
        let pending = self.ledger.lock().pending();
        join_all(pending).await;
    }

    /// Number of claims whose transaction has not settled yet.
    pub fn pending(&self) -> usize {
        self.ledger.lock().pending().len()
    }
}
