//! Transactions: reducer invocation and conflict-ordered scheduling.
//!
//! A transaction is one run of one handler's reducer for one dispatched
//! event. The [`Scheduler`] decides when it may start, based on the paths it
//! touches. The [`Invocation`] runs it: read the handler's slice, reduce,
//! write every produced value, and roll back on failure.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = Scheduler::new(tokio::runtime::Handle::current());
//! let paths = PathSet::parse(["counters.a"])?;
//!
//! scheduler.enqueue(&paths, |id| async move {
//!     tracing::info!(transaction = %id, "running");
//! });
//! scheduler.drain().await;
//! ```

mod invocation;
mod reduction;
mod report;
mod scheduler;

pub use invocation::{Invocation, Outcome};
pub use reduction::{Reducer, Reduction, StepStream};
pub use report::{FailureSink, LogSink, TransactionFailure};
pub use scheduler::Scheduler;
