//! Running one reducer call against its slice of state.

use crate::error::StoreError;
use crate::subscriptions::ChangeKind;
use crate::transactions::reduction::Reducer;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// How an invocation settled.
#[derive(Debug)]
pub enum Outcome {
    /// Every produced value was written.
    Committed { steps: usize },
    /// The reducer failed; its paths were restored to the pre-invocation
    /// snapshot. `steps` counts the interim writes that were discarded.
    RolledBack { steps: usize, error: StoreError },
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }
}

/// A single reducer call bound to a read accessor and a write sink.
pub struct Invocation<R, W> {
    reducer: Arc<dyn Reducer>,
    payload: Option<Value>,
    read: R,
    write: W,
}

impl<R, W> Invocation<R, W>
where
    R: FnOnce() -> Value,
    W: FnMut(Value, ChangeKind),
{
    pub fn new(reducer: Arc<dyn Reducer>, payload: Option<Value>, read: R, write: W) -> Self {
        Self {
            reducer,
            payload,
            read,
            write,
        }
    }

    /// Read, reduce, and write each produced value in order.
    ///
    /// Never fails: an error or panic from the reducer, or from any of its
    /// steps, stops consumption and writes back the state read at the start.
    pub async fn run(self) -> Outcome {
        let Invocation {
            reducer,
            payload,
            read,
            mut write,
        } = self;

        let old = read();

        let reduced = panic::catch_unwind(AssertUnwindSafe(|| {
            reducer.reduce(old.clone(), payload)
        }));
        let reduction = match reduced {
            Ok(reduction) => reduction,
            Err(panic) => {
                let error = StoreError::panicked(panic.as_ref());
                return rollback(old, 0, error, &mut write);
            }
        };

        let mut steps = reduction.into_steps();
        let mut written = 0;
        loop {
            let next = AssertUnwindSafe(steps.next()).catch_unwind().await;
            match next {
                Ok(Some(Ok(value))) => {
                    write(value, ChangeKind::Step);
                    written += 1;
                }
                Ok(None) => return Outcome::Committed { steps: written },
                Ok(Some(Err(source))) => {
                    drop(steps);
                    return rollback(old, written, StoreError::reducer(source), &mut write);
                }
                Err(panic) => {
                    drop(steps);
                    let error = StoreError::panicked(panic.as_ref());
                    return rollback(old, written, error, &mut write);
                }
            }
        }
    }
}

fn rollback<W>(old: Value, steps: usize, error: StoreError, write: &mut W) -> Outcome
where
    W: FnMut(Value, ChangeKind),
{
    write(old, ChangeKind::Rollback);
    Outcome::RolledBack { steps, error }
}
