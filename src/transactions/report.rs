//! Reporting of rolled-back transactions.

use crate::error::StoreError;
use crate::types::{PathSet, TransactionId};
use tracing::error;

/// A transaction whose reducer failed and whose paths were rolled back.
#[derive(Debug)]
pub struct TransactionFailure {
    pub transaction: TransactionId,
    pub event_type: String,
    pub paths: PathSet,
    /// Interim writes made before the failure, now discarded.
    pub steps_discarded: usize,
    pub error: StoreError,
}

/// Destination for rollback diagnostics.
///
/// Called exactly once per rolled-back transaction, after the rollback write.
/// Implementations must not panic.
pub trait FailureSink: Send + Sync {
    fn report(&self, failure: &TransactionFailure);
}

impl<F> FailureSink for F
where
    F: Fn(&TransactionFailure) + Send + Sync,
{
    fn report(&self, failure: &TransactionFailure) {
        self(failure)
    }
}

/// Default sink: logs through `tracing` at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl FailureSink for LogSink {
    fn report(&self, failure: &TransactionFailure) {
        error!(
            transaction = %failure.transaction,
            event_type = %failure.event_type,
            paths = %failure.paths,
            steps_discarded = failure.steps_discarded,
            error = %failure.error,
            "transaction rolled back"
        );
    }
}
