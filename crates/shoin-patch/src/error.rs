//! Error types for pointer parsing, patch application and wire decoding.

use thiserror::Error;

/// A malformed JSON Pointer (RFC 6901).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// Non-empty pointers must start with `/`.
    #[error("pointer {0:?} does not start with '/'")]
    MissingLeadingSlash(String),

    /// `~` followed by something other than `0` or `1`.
    #[error("pointer {0:?} contains an invalid '~' escape")]
    InvalidEscape(String),
}

/// Why a single patch operation could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpError {
    #[error(transparent)]
    Pointer(#[from] PointerError),

    /// Nothing exists at the path.
    #[error("no value at {0:?}")]
    PathNotFound(String),

    /// The parent of the target does not exist or is a scalar.
    #[error("parent of {0:?} does not exist or is not a container")]
    ParentNotFound(String),

    /// Array token that is not a valid index (or `-` where `-` is not allowed).
    #[error("invalid array index {token:?} in {path:?}")]
    InvalidIndex { path: String, token: String },

    /// Array index past the end.
    #[error("array index {index} out of bounds (len {len}) in {path:?}")]
    IndexOutOfBounds { path: String, index: usize, len: usize },

    /// `move` whose destination lies inside its source.
    #[error("cannot move {from:?} into its own child {path:?}")]
    MoveIntoChild { from: String, path: String },

    /// The document root cannot be removed.
    #[error("cannot remove the document root")]
    RemoveRoot,

    /// A `test` operation found a different value.
    #[error("test failed at {0:?}")]
    TestFailed(String),
}

/// A patch batch failed. No part of it was applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("patch operation {index} ({op}) failed: {source}")]
pub struct PatchError {
    /// Position of the failing op in the batch.
    pub index: usize,
    /// Op name (`add`, `remove`, ...).
    pub op: &'static str,
    #[source]
    pub source: OpError,
}

/// A wire frame could not be turned into a [`SyncMessage`](crate::SyncMessage).
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Not JSON, or not an object with a string `type`.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// `type` is not one this client understands.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// A known message type whose payload does not parse. For `patch`
    /// frames this means a malformed operation.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Whether the frame carried state we failed to understand, as opposed
    /// to a frame we can simply drop.
    pub fn is_state_error(&self) -> bool {
        matches!(self, DecodeError::InvalidPayload { .. })
    }
}
