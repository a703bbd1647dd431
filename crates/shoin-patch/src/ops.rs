//! RFC 6902 patch operations as they appear on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON Patch operation.
///
/// `path` and `from` are kept as raw pointer strings; they are parsed when
/// the operation is applied so that a bad pointer fails the batch like any
/// other operation error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self::Add {
            path: path.into(),
            value,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self::Replace {
            path: path.into(),
            value,
        }
    }

    pub fn move_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Move {
            from: from.into(),
            path: path.into(),
        }
    }

    pub fn copy_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Copy {
            from: from.into(),
            path: path.into(),
        }
    }

    pub fn test(path: impl Into<String>, value: Value) -> Self {
        Self::Test {
            path: path.into(),
            value,
        }
    }

    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
            PatchOperation::Move { .. } => "move",
            PatchOperation::Copy { .. } => "copy",
            PatchOperation::Test { .. } => "test",
        }
    }

    /// Target path.
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Move { path, .. }
            | PatchOperation::Copy { path, .. }
            | PatchOperation::Test { path, .. } => path,
        }
    }

    /// Source path for `move` and `copy`.
    pub fn from(&self) -> Option<&str> {
        match self {
            PatchOperation::Move { from, .. } | PatchOperation::Copy { from, .. } => Some(from),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let op: PatchOperation =
            serde_json::from_value(json!({"op": "replace", "path": "/a", "value": 1})).unwrap();
        assert_eq!(op, PatchOperation::replace("/a", json!(1)));

        let op: PatchOperation =
            serde_json::from_value(json!({"op": "move", "from": "/a", "path": "/b"})).unwrap();
        assert_eq!(op.from(), Some("/a"));
        assert_eq!(op.path(), "/b");
        assert_eq!(op.name(), "move");

        assert_eq!(
            serde_json::to_value(PatchOperation::remove("/x")).unwrap(),
            json!({"op": "remove", "path": "/x"})
        );
    }

    #[test]
    fn test_null_value_is_kept() {
        let op: PatchOperation =
            serde_json::from_value(json!({"op": "add", "path": "/a", "value": null})).unwrap();
        assert_eq!(op, PatchOperation::add("/a", Value::Null));
    }

    #[test]
    fn test_malformed_ops_rejected() {
        let parse = |v: Value| serde_json::from_value::<PatchOperation>(v);
        assert!(parse(json!({"op": "frob", "path": "/a"})).is_err());
        assert!(parse(json!({"op": "add", "path": "/a"})).is_err());
        assert!(parse(json!({"op": "move", "path": "/a"})).is_err());
    }
}
