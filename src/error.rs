//! Error types for the state store.

use crate::types::Path;
use std::any::Any;
use thiserror::Error;

/// Boxed error returned by reducers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Overlapping paths in one handler: \"{ancestor}\" contains \"{descendant}\"")]
    OverlappingPaths { ancestor: Path, descendant: Path },

    #[error("Handler registered with an empty event type")]
    EmptyEventType,

    #[error("Invalid handler key {0:?} (expected \"path#type\")")]
    InvalidHandlerKey(String),

    #[error("Store must be created inside a tokio runtime")]
    NoRuntime,

    #[error("Reducer failed: {source}")]
    Reducer {
        #[source]
        source: BoxError,
    },

    #[error("Reducer panicked: {message}")]
    ReducerPanicked { message: String },
}

impl StoreError {
    /// Wrap any reducer error.
    pub fn reducer(source: impl Into<BoxError>) -> Self {
        StoreError::Reducer {
            source: source.into(),
        }
    }

    /// Build from a caught panic payload.
    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        StoreError::ReducerPanicked {
            message: panic_message(payload),
        }
    }

    /// True for failures raised by handler code rather than registration.
    pub fn is_reducer_failure(&self) -> bool {
        matches!(
            self,
            StoreError::Reducer { .. } | StoreError::ReducerPanicked { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Best-effort text of a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
