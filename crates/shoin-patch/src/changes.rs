//! Which documents a patch batch touched.
//!
//! Document content lives under `/documents/{id}`. Consumers use the ids
//! returned here to invalidate cached or rendered content after a patch.

use std::collections::HashSet;

use crate::ops::PatchOperation;
use crate::pointer::{APPEND_TOKEN, Pointer};

/// Top-level member holding document content.
pub const DOCUMENTS_ROOT: &str = "documents";

/// Collect the ids of every document touched by `ops`.
///
/// A path counts when it is `/documents/{id}` or lies below it. `move`
/// also counts its `from` path, since the source document loses content.
/// Paths outside document space, and unparseable paths, are ignored.
pub fn document_ids_affected<'a, I>(ops: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a PatchOperation>,
{
    let mut ids = HashSet::new();
    for op in ops {
        if let Some(id) = document_id(op.path()) {
            ids.insert(id);
        }
        if let PatchOperation::Move { from, .. } = op {
            ids.extend(document_id(from));
        }
    }
    ids
}

/// The document id a path points into, if any.
pub fn document_id(path: &str) -> Option<String> {
    let pointer = Pointer::parse(path).ok()?;
    match pointer.tokens() {
        [root, id, ..] if root == DOCUMENTS_ROOT && id != APPEND_TOKEN => Some(id.clone()),
        _ => None,
    }
}
