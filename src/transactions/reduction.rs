//! Reducer results and the trait handlers implement.

use crate::error::BoxError;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;

/// Lazy, ordered sequence of state values produced by one reducer call.
pub type StepStream = BoxStream<'static, Result<Value, BoxError>>;

/// What a reducer hands back.
///
/// Every shape is consumed the same way: as a stream of values, each written
/// to the handler's paths as soon as it is available. A one-shot value is a
/// stream of length one; [`Reduction::Unchanged`] is the empty stream.
pub enum Reduction {
    /// No new state.
    Unchanged,
    /// A single replacement value, available immediately.
    Value(Value),
    /// The reducer failed before producing anything further.
    Failed(BoxError),
    /// A value (or any other reduction) that becomes available later.
    Deferred(BoxFuture<'static, Reduction>),
    /// Incremental values produced synchronously, one per step.
    Steps(Box<dyn Iterator<Item = Result<Value, BoxError>> + Send>),
    /// Incremental values that may await between steps.
    Stream(StepStream),
}

impl Reduction {
    pub fn value(value: Value) -> Self {
        Reduction::Value(value)
    }

    pub fn fail(error: impl Into<BoxError>) -> Self {
        Reduction::Failed(error.into())
    }

    /// Resolve later. The output may be anything convertible into a
    /// reduction, including `Result`s and nested streams.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future + Send + 'static,
        F::Output: Into<Reduction>,
    {
        Reduction::Deferred(future.map(Into::into).boxed())
    }

    pub fn steps<I>(steps: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Reduction::Steps(Box::new(steps.into_iter().map(Ok)))
    }

    /// Synchronous steps where any step may fail.
    pub fn try_steps<I, E>(steps: I) -> Self
    where
        I: IntoIterator<Item = Result<Value, E>>,
        I::IntoIter: Send + 'static,
        E: Into<BoxError>,
    {
        Reduction::Steps(Box::new(
            steps.into_iter().map(|step| step.map_err(Into::into)),
        ))
    }

    pub fn stream<S>(steps: S) -> Self
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        Reduction::Stream(steps.map(Ok).boxed())
    }

    /// Asynchronous steps where any step may fail.
    pub fn try_stream<S, E>(steps: S) -> Self
    where
        S: Stream<Item = Result<Value, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Reduction::Stream(steps.map(|step| step.map_err(Into::into)).boxed())
    }

    /// Normalize into the single step protocol.
    pub fn into_steps(self) -> StepStream {
        match self {
            Reduction::Unchanged => stream::empty().boxed(),
            Reduction::Value(value) => stream::once(future::ready(Ok(value))).boxed(),
            Reduction::Failed(error) => stream::once(future::ready(Err(error))).boxed(),
            Reduction::Deferred(later) => stream::once(later)
                .flat_map(Reduction::into_steps)
                .boxed(),
            Reduction::Steps(steps) => stream::iter(steps).boxed(),
            Reduction::Stream(steps) => steps,
        }
    }
}

impl fmt::Debug for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Unchanged => write!(f, "Unchanged"),
            Reduction::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reduction::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Reduction::Deferred(_) => write!(f, "Deferred(..)"),
            Reduction::Steps(_) => write!(f, "Steps(..)"),
            Reduction::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

impl From<Value> for Reduction {
    fn from(value: Value) -> Self {
        Reduction::Value(value)
    }
}

impl From<()> for Reduction {
    fn from(_: ()) -> Self {
        Reduction::Unchanged
    }
}

impl From<Option<Value>> for Reduction {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(value) => Reduction::Value(value),
            None => Reduction::Unchanged,
        }
    }
}

impl<T, E> From<Result<T, E>> for Reduction
where
    T: Into<Reduction>,
    E: Into<BoxError>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(ok) => ok.into(),
            Err(error) => Reduction::Failed(error.into()),
        }
    }
}

/// A handler's state transition.
///
/// Receives the partial state for the handler's paths (see
/// [`StateTree::read`](crate::state::StateTree::read)) and the event payload.
/// Implemented for every `Fn(Value, Option<Value>) -> impl Into<Reduction>`.
pub trait Reducer: Send + Sync + 'static {
    fn reduce(&self, state: Value, payload: Option<Value>) -> Reduction;
}

impl<F, R> Reducer for F
where
    F: Fn(Value, Option<Value>) -> R + Send + Sync + 'static,
    R: Into<Reduction>,
{
    fn reduce(&self, state: Value, payload: Option<Value>) -> Reduction {
        self(state, payload).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::TryStreamExt;
    use serde_json::json;

    fn collect(reduction: Reduction) -> Result<Vec<Value>, String> {
        block_on(reduction.into_steps().try_collect::<Vec<_>>()).map_err(|e| e.to_string())
    }

    #[test]
    fn test_plain_value_is_single_step() {
        assert_eq!(collect(json!(1).into()).unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_unchanged_is_empty() {
        assert!(collect(().into()).unwrap().is_empty());
        assert!(collect(None::<Value>.into()).unwrap().is_empty());
    }

    #[test]
    fn test_result_conversion() {
        let ok: Result<Value, BoxError> = Ok(json!("ok"));
        assert_eq!(collect(ok.into()).unwrap(), vec![json!("ok")]);

        let err: Result<Value, &str> = Err("boom");
        assert_eq!(collect(err.into()).unwrap_err(), "boom");
    }

    #[test]
    fn test_deferred_flattens() {
        let nested = Reduction::deferred(async { Reduction::steps(vec![json!(1), json!(2)]) });
        assert_eq!(collect(nested).unwrap(), vec![json!(1), json!(2)]);

        let nothing = Reduction::deferred(async {});
        assert!(collect(nothing).unwrap().is_empty());
    }

    #[test]
    fn test_try_steps_stop_at_failure() {
        let steps = Reduction::try_steps(vec![Ok(json!(1)), Err("bad step"), Ok(json!(3))]);
        assert_eq!(collect(steps).unwrap_err(), "bad step");
    }

    #[test]
    fn test_stream_steps_in_order() {
        let steps = Reduction::stream(futures::stream::iter(vec![json!("a"), json!("b")]));
        assert_eq!(collect(steps).unwrap(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn test_closure_is_reducer() {
        let double = |state: Value, _payload: Option<Value>| json!(state.as_i64().unwrap_or(0) * 2);
        let reduction = double.reduce(json!(21), None);
        assert_eq!(collect(reduction).unwrap(), vec![json!(42)]);
    }
}
