//! Snapshot/patch reconciliation for Shoin documents.
//!
//! The server owns the authoritative state of every project. Clients follow
//! it: a `snapshot` replaces local state, a `patch` is an RFC 6902 batch
//! applied against it. There is no merging here: if a patch does not apply,
//! the client is out of sync and needs a fresh snapshot.
//!
//! # Guarantees
//!
//! - **Copy-on-write**: documents are `Arc<Value>`; reconciling never
//!   mutates a document someone else may hold.
//! - **All-or-nothing**: a batch applies completely or not at all.
//! - **Ordered**: ops apply strictly in array order.

mod apply;
mod changes;
mod error;
mod message;
mod ops;
pub mod pointer;
mod reconcile;

pub use apply::{apply_patch, values_equal};
pub use changes::{DOCUMENTS_ROOT, document_id, document_ids_affected};
pub use error::{DecodeError, OpError, PatchError, PointerError};
pub use message::{ClientMessage, SyncMessage};
pub use ops::PatchOperation;
pub use pointer::Pointer;
pub use reconcile::{Document, reconcile};

/// Result type for patch application.
pub type Result<T> = std::result::Result<T, PatchError>;
