//! Path-scoped reads and writes over a single JSON tree.

use crate::types::{Path, PathSet};
use serde_json::{Map, Value};

/// The live state tree.
///
/// Handlers never see the tree directly: they get a partial view built by
/// [`StateTree::read`] and hand results back through [`StateTree::write`],
/// both scoped to the handler's declared paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateTree {
    root: Value,
}

impl StateTree {
    /// An empty tree (`null` at the root).
    pub fn new() -> Self {
        Self { root: Value::Null }
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Clone of the full tree.
    pub fn snapshot(&self) -> Value {
        self.root.clone()
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// Value stored at `path`, if every segment resolves.
    pub fn get(&self, path: &Path) -> Option<&Value> {
        lookup(&self.root, path)
    }

    /// Replace the subtree at `path`. `None` removes the key.
    ///
    /// Missing or non-object intermediate nodes are replaced by empty objects
    /// when storing a value.
    pub fn set(&mut self, path: &Path, value: Option<Value>) {
        splice(&mut self.root, path, value);
    }

    /// Partial view holding only the requested subtrees at their original
    /// locations.
    ///
    /// A root member returns the whole tree. Paths that do not resolve are
    /// left out.
    pub fn read(&self, paths: &PathSet) -> Value {
        if paths.contains_root() {
            return self.snapshot();
        }

        let mut partial = Value::Object(Map::new());
        for path in paths {
            if let Some(value) = self.get(path) {
                splice(&mut partial, path, Some(value.clone()));
            }
        }
        partial
    }

    /// Splice `value` back into the tree, one declared path at a time.
    ///
    /// With a root member the whole tree becomes `value`. Otherwise only the
    /// subtree of `value` found at each path is copied over; anything else in
    /// `value` is ignored. A path missing from `value` is removed from the
    /// tree.
    pub fn write(&mut self, paths: &PathSet, value: Value) {
        if paths.contains_root() {
            self.root = value;
            return;
        }

        for path in paths {
            let segment = lookup(&value, path).cloned();
            splice(&mut self.root, path, segment);
        }
    }
}

fn lookup<'a>(node: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(node, |node, segment| node.as_object()?.get(segment))
}

fn splice(node: &mut Value, path: &Path, value: Option<Value>) {
    let Some((last, parents)) = path.segments().split_last() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };

    match value {
        Some(value) => {
            let mut current = node;
            for segment in parents {
                current = object_slot(current, segment);
            }
            *object_slot(current, last) = value;
        }
        None => {
            let mut current = node;
            for segment in parents {
                match current.as_object_mut().and_then(|map| map.get_mut(segment)) {
                    Some(next) => current = next,
                    None => return,
                }
            }
            if let Some(map) = current.as_object_mut() {
                map.remove(last);
            }
        }
    }
}

/// The entry for `segment` in `node`, inserted as `null` when missing. A
/// non-object `node` is replaced by an empty object first.
fn object_slot<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    &mut node[segment]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(raw: &[&str]) -> PathSet {
        PathSet::parse(raw).unwrap()
    }

    #[test]
    fn test_read_root_returns_everything() {
        let tree = StateTree::from_value(json!({"a": 1, "b": {"c": 2}}));
        assert_eq!(tree.read(&paths(&[""])), json!({"a": 1, "b": {"c": 2}}));
    }

    #[test]
    fn test_read_keeps_original_locations() {
        let tree = StateTree::from_value(json!({"a": {"b": 1, "x": 9}, "c": 3, "d": 4}));
        assert_eq!(
            tree.read(&paths(&["a.b", "c"])),
            json!({"a": {"b": 1}, "c": 3})
        );
    }

    #[test]
    fn test_read_missing_is_empty() {
        let tree = StateTree::new();
        assert_eq!(tree.read(&paths(&["a.b"])), json!({}));

        let tree = StateTree::from_value(json!({"a": 5}));
        assert_eq!(tree.read(&paths(&["a.b"])), json!({}));
    }

    #[test]
    fn test_write_root_replaces() {
        let mut tree = StateTree::from_value(json!({"a": 1, "b": 2}));
        tree.write(&paths(&[""]), json!({"a": null}));
        assert_eq!(tree.root(), &json!({"a": null}));
    }

    #[test]
    fn test_write_is_local_to_paths() {
        let mut tree = StateTree::from_value(json!({"a": {"b": 1, "x": 9}, "c": 0}));
        tree.write(&paths(&["a.b"]), json!({"a": {"b": 2}, "c": 3}));
        assert_eq!(tree.root(), &json!({"a": {"b": 2, "x": 9}, "c": 0}));
    }

    #[test]
    fn test_write_materializes_intermediates() {
        let mut tree = StateTree::new();
        tree.write(&paths(&["a.b.c"]), json!({"a": {"b": {"c": true}}}));
        assert_eq!(tree.root(), &json!({"a": {"b": {"c": true}}}));

        let mut tree = StateTree::from_value(json!({"a": 7}));
        tree.set(&Path::parse("a.b").unwrap(), Some(json!(1)));
        assert_eq!(tree.root(), &json!({"a": {"b": 1}}));

        let mut tree = StateTree::from_value(json!({"a": [1, 2], "z": 0}));
        tree.set(&Path::parse("a.b.c").unwrap(), Some(json!("deep")));
        assert_eq!(tree.root(), &json!({"a": {"b": {"c": "deep"}}, "z": 0}));
    }

    #[test]
    fn test_write_missing_segment_removes_key() {
        let mut tree = StateTree::from_value(json!({"a": 1, "b": 2}));
        tree.write(&paths(&["a"]), json!({}));
        assert_eq!(tree.root(), &json!({"b": 2}));
    }

    #[test]
    fn test_read_then_write_restores() {
        let original = json!({"a": {"b": 1}, "c": 2});
        let mut tree = StateTree::from_value(original.clone());
        let set = paths(&["a.b", "missing"]);

        let before = tree.read(&set);
        tree.write(&set, json!({"a": {"b": 100}, "missing": 5}));
        assert_ne!(tree.root(), &original);

        tree.write(&set, before);
        assert_eq!(tree.root(), &original);
    }
}
