//! Handler registration.

use crate::error::{Result, StoreError};
use crate::transactions::{Reducer, Reduction};
use crate::types::PathSet;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Separator between path and event type in a handler key.
const KEY_SEPARATOR: char = '#';

/// A reducer bound to an event type and the paths it may read and write.
///
/// Paths are kept as written and validated when the store is created.
pub struct Handler {
    event_type: String,
    paths: Vec<String>,
    reducer: Arc<dyn Reducer>,
}

impl Handler {
    /// Bind a closure reducer.
    ///
    /// ```ignore
    /// Handler::new("increment", ["counter"], |state, _| {
    ///     json!({"counter": state["counter"].as_i64().unwrap_or(0) + 1})
    /// })
    /// ```
    pub fn new<P, S, F, R>(event_type: impl Into<String>, paths: P, reducer: F) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Value, Option<Value>) -> R + Send + Sync + 'static,
        R: Into<Reduction>,
    {
        Self::with_reducer(event_type, paths, reducer)
    }

    /// Bind any [`Reducer`] implementation.
    pub fn with_reducer<P, S>(
        event_type: impl Into<String>,
        paths: P,
        reducer: impl Reducer,
    ) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_type: event_type.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            reducer: Arc::new(reducer),
        }
    }

    /// Build from a `"path#type"` key, e.g. `"a.b#increment"`. An empty path
    /// part (`"#init"`) is the root.
    pub fn from_key<F, R>(key: &str, reducer: F) -> Result<Self>
    where
        F: Fn(Value, Option<Value>) -> R + Send + Sync + 'static,
        R: Into<Reduction>,
    {
        let (path, event_type) = key
            .split_once(KEY_SEPARATOR)
            .filter(|(_, event_type)| !event_type.contains(KEY_SEPARATOR))
            .ok_or_else(|| StoreError::InvalidHandlerKey(key.to_string()))?;
        Ok(Self::new(event_type, [path], reducer))
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Validate into a registration.
    pub(crate) fn register(self) -> Result<Registration> {
        if self.event_type.is_empty() {
            return Err(StoreError::EmptyEventType);
        }
        let paths = PathSet::parse(&self.paths)?;
        Ok(Registration {
            event_type: self.event_type,
            paths,
            reducer: self.reducer,
        })
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("event_type", &self.event_type)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

/// A validated handler, as held by the store.
pub(crate) struct Registration {
    pub event_type: String,
    pub paths: PathSet,
    pub reducer: Arc<dyn Reducer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(_: Value, _: Option<Value>) {}

    #[test]
    fn test_register_valid() {
        let registration = Handler::new("move", ["a.b", "c"], noop).register().unwrap();
        assert_eq!(registration.event_type, "move");
        assert_eq!(registration.paths.len(), 2);
        assert!(!registration.paths.contains_root());
    }

    #[test]
    fn test_register_without_paths() {
        let registration = Handler::new("ping", Vec::<String>::new(), noop)
            .register()
            .unwrap();
        assert!(registration.paths.is_empty());
    }

    #[test]
    fn test_register_rejects_malformed() {
        assert!(matches!(
            Handler::new("", [""], noop).register(),
            Err(StoreError::EmptyEventType)
        ));
        assert!(matches!(
            Handler::new("x", ["a..b"], noop).register(),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            Handler::new("x", ["a", "a.b"], noop).register(),
            Err(StoreError::OverlappingPaths { .. })
        ));
    }

    #[test]
    fn test_from_key() {
        let root = Handler::from_key("#init", |_, _| json!(0)).unwrap();
        assert_eq!(root.event_type(), "init");
        assert_eq!(root.paths(), &[""]);
        assert!(root.register().unwrap().paths.contains_root());

        let nested = Handler::from_key("a.b#increment", noop).unwrap();
        assert_eq!(nested.event_type(), "increment");
        assert_eq!(nested.paths(), &["a.b"]);
    }

    #[test]
    fn test_from_key_rejects_bad_keys() {
        for key in ["no-separator", "a#b#c"] {
            assert!(matches!(
                Handler::from_key(key, noop),
                Err(StoreError::InvalidHandlerKey(_))
            ));
        }
    }
}
