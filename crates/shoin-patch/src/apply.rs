//! RFC 6902 patch application.
//!
//! [`apply_patch`] never touches its input: it works on a deep copy and only
//! returns it once every operation succeeded. A failing operation (missing
//! path, failed `test`, bad pointer) discards the copy, so callers see either
//! the whole batch or nothing.

use serde_json::Value;
use tracing::trace;

use crate::error::{OpError, PatchError};
use crate::ops::PatchOperation;
use crate::pointer::{APPEND_TOKEN, Pointer, parse_index, walk_mut};

/// Apply `ops` in order to a copy of `document`.
pub fn apply_patch(document: &Value, ops: &[PatchOperation]) -> Result<Value, PatchError> {
    let mut working = document.clone();
    for (index, op) in ops.iter().enumerate() {
        apply_op(&mut working, op).map_err(|source| PatchError {
            index,
            op: op.name(),
            source,
        })?;
    }
    trace!(ops = ops.len(), "patch applied");
    Ok(working)
}

fn apply_op(doc: &mut Value, op: &PatchOperation) -> Result<(), OpError> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, path).map(drop),
        PatchOperation::Replace { path, value } => replace(doc, path, value.clone()),
        PatchOperation::Move { from, path } => move_value(doc, from, path),
        PatchOperation::Copy { from, path } => {
            let source = Pointer::parse(from)?;
            let value = source
                .resolve(doc)
                .cloned()
                .ok_or_else(|| OpError::PathNotFound(from.clone()))?;
            add(doc, path, value)
        }
        PatchOperation::Test { path, value } => {
            let actual = Pointer::parse(path)?
                .resolve(doc)
                .ok_or_else(|| OpError::PathNotFound(path.clone()))?;
            if values_equal(actual, value) {
                Ok(())
            } else {
                Err(OpError::TestFailed(path.clone()))
            }
        }
    }
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), OpError> {
    let pointer = Pointer::parse(path)?;
    let Some((parent, last)) = pointer.split_last() else {
        *doc = value;
        return Ok(());
    };

    match walk_mut(doc, parent) {
        Some(Value::Object(map)) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Some(Value::Array(items)) => {
            if last == APPEND_TOKEN {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(last).ok_or_else(|| OpError::InvalidIndex {
                path: path.to_string(),
                token: last.to_string(),
            })?;
            if index > items.len() {
                return Err(OpError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(OpError::ParentNotFound(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, OpError> {
    let pointer = Pointer::parse(path)?;
    let Some((parent, last)) = pointer.split_last() else {
        return Err(OpError::RemoveRoot);
    };

    match walk_mut(doc, parent) {
        Some(Value::Object(map)) => map
            .remove(last)
            .ok_or_else(|| OpError::PathNotFound(path.to_string())),
        Some(Value::Array(items)) => {
            let index = parse_index(last).ok_or_else(|| OpError::InvalidIndex {
                path: path.to_string(),
                token: last.to_string(),
            })?;
            if index >= items.len() {
                return Err(OpError::IndexOutOfBounds {
                    path: path.to_string(),
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(OpError::PathNotFound(path.to_string())),
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> Result<(), OpError> {
    let target = Pointer::parse(path)?
        .resolve_mut(doc)
        .ok_or_else(|| OpError::PathNotFound(path.to_string()))?;
    *target = value;
    Ok(())
}

fn move_value(doc: &mut Value, from: &str, path: &str) -> Result<(), OpError> {
    let source = Pointer::parse(from)?;
    let target = Pointer::parse(path)?;
    if source == target {
        // Still has to exist.
        return source
            .resolve(doc)
            .map(drop)
            .ok_or_else(|| OpError::PathNotFound(from.to_string()));
    }
    if source.is_proper_prefix_of(&target) {
        return Err(OpError::MoveIntoChild {
            from: from.to_string(),
            path: path.to_string(),
        });
    }
    let value = remove(doc, from)?;
    add(doc, path, value)
}

/// Deep equality with numbers compared by value (`1` equals `1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}
