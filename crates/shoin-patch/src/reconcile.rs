//! Reconciliation: prior document + inbound message → next document.

use std::sync::Arc;

use serde_json::Value;

use crate::apply::apply_patch;
use crate::error::PatchError;
use crate::message::SyncMessage;

/// A project's synchronized state, shared read-only with observers.
///
/// Never mutated in place: every change produces a new `Arc`, so anyone
/// holding an older document keeps seeing exactly what they captured.
pub type Document = Arc<Value>;

/// Produce the next document from `current` and `message`.
///
/// - `Snapshot` replaces whatever was there.
/// - `Patch` without a base is a no-op that yields `None`; a snapshot has to
///   arrive first.
/// - `Patch` with a base yields a new document with every op applied, or an
///   error if any op failed. On error `current` is still the valid state.
pub fn reconcile(
    current: Option<&Document>,
    message: SyncMessage,
) -> Result<Option<Document>, PatchError> {
    match message {
        SyncMessage::Snapshot(data) => Ok(Some(Arc::new(data))),
        SyncMessage::Patch(ops) => match current {
            None => Ok(None),
            Some(doc) => apply_patch(doc, &ops).map(|next| Some(Arc::new(next))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::PatchOperation;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Arc::new(value)
    }

    #[test]
    fn test_snapshot_always_wins() {
        let data = json!({"documents": {"1": {}}});
        for prior in [None, Some(doc(json!({"x": 1}))), Some(doc(json!([])))] {
            let out = reconcile(prior.as_ref(), SyncMessage::Snapshot(data.clone())).unwrap();
            assert_eq!(out.as_deref(), Some(&data));
        }
    }

    #[test]
    fn test_patch_without_base_is_noop() {
        let ops = vec![PatchOperation::add("/a", json!(1))];
        assert!(reconcile(None, SyncMessage::Patch(ops)).unwrap().is_none());
        assert!(reconcile(None, SyncMessage::Patch(vec![])).unwrap().is_none());
    }

    #[test]
    fn test_copy_on_write() {
        let before = doc(json!({"a": 1, "nested": {"b": [1, 2]}}));
        let held = Arc::clone(&before);
        let after = reconcile(
            Some(&before),
            SyncMessage::Patch(vec![
                PatchOperation::replace("/a", json!(2)),
                PatchOperation::add("/nested/b/-", json!(3)),
            ]),
        )
        .unwrap()
        .unwrap();

        assert_eq!(*after, json!({"a": 2, "nested": {"b": [1, 2, 3]}}));
        assert_eq!(*held, json!({"a": 1, "nested": {"b": [1, 2]}}));
        assert!(!Arc::ptr_eq(&held, &after));
    }

    #[test]
    fn test_failed_batch_leaves_base_untouched() {
        let base = doc(json!({"a": 0, "b": "y", "c": 0}));
        let err = reconcile(
            Some(&base),
            SyncMessage::Patch(vec![
                PatchOperation::replace("/a", json!(1)),
                PatchOperation::test("/b", json!("x")),
                PatchOperation::replace("/c", json!(2)),
            ]),
        )
        .unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(*base, json!({"a": 0, "b": "y", "c": 0}));
    }

    #[test]
    fn test_empty_patch_yields_equal_document() {
        let base = doc(json!({"a": 1}));
        let out = reconcile(Some(&base), SyncMessage::Patch(vec![])).unwrap().unwrap();
        assert_eq!(out, base);
    }
}
