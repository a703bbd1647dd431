//! Client-side sync state for one project.
//!
//! Wraps [`reconcile`] with the bookkeeping a long-lived connection needs:
//! which document is current, whether we are waiting for a snapshot, and a
//! version counter observers can compare.
//!
//! # State Machine
//!
//! ```text
//! +----------------+
//! |     Empty      | document=None
//! +-------+--------+
//!         | snapshot
//!         v
//! +----------------+
//! |   Following    | document=Some, awaiting_snapshot=false
//! |  (patches ok)  |
//! +-------+--------+
//!         | patch failure OR reconnect (reset)
//!         v
//! +----------------+
//! | Needs Snapshot | document=Some (last good), awaiting_snapshot=true
//! | (patches skip) |
//! +-------+--------+
//!         | snapshot
//!         v
//!     Following
//! ```

use std::collections::HashSet;

use shoin_patch::{Document, PatchError, SyncMessage, document_ids_affected, reconcile};
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of applying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// The document was replaced wholesale.
    Snapshot,
    /// A patch applied; `documents` are the ids it touched.
    Patched { documents: HashSet<String> },
    /// Nothing changed (see reason).
    Skipped { reason: SkipReason },
}

/// Why a message was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Patch arrived before any snapshot.
    NoBase,
    /// Patch arrived while waiting for a snapshot after a reset.
    AwaitingSnapshot,
}

/// A patch could not be applied. The previous document is still current.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("state desynchronized: {0}")]
    Reconcile(#[from] PatchError),
}

#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Last good document.
    document: Option<Document>,
    /// Skip patches until the next snapshot.
    awaiting_snapshot: bool,
    /// Bumped on every applied message.
    version: u64,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn awaiting_snapshot(&self) -> bool {
        self.awaiting_snapshot
    }

    /// Require a snapshot before applying further patches.
    ///
    /// Keeps the document so observers still see the last good state.
    pub fn reset(&mut self) {
        self.awaiting_snapshot = true;
    }

    /// Forget the document entirely (fresh connect).
    pub fn clear(&mut self) {
        self.document = None;
        self.awaiting_snapshot = false;
    }

    /// Apply one inbound message.
    ///
    /// On error the state is reset (awaiting snapshot) and the document is
    /// left as it was.
    pub fn apply(&mut self, message: SyncMessage) -> Result<SyncResult, SyncError> {
        if let SyncMessage::Patch(ops) = &message {
            if self.awaiting_snapshot {
                debug!(ops = ops.len(), "skipping patch while awaiting snapshot");
                return Ok(SyncResult::Skipped {
                    reason: SkipReason::AwaitingSnapshot,
                });
            }
        }

        let touched = match &message {
            SyncMessage::Patch(ops) => Some(document_ids_affected(ops)),
            SyncMessage::Snapshot(_) => None,
        };

        match reconcile(self.document.as_ref(), message) {
            Ok(Some(next)) => {
                self.document = Some(next);
                self.awaiting_snapshot = false;
                self.version += 1;
                Ok(match touched {
                    None => SyncResult::Snapshot,
                    Some(documents) => SyncResult::Patched { documents },
                })
            }
            Ok(None) => Ok(SyncResult::Skipped {
                reason: SkipReason::NoBase,
            }),
            Err(e) => {
                warn!(error = %e, version = self.version, "patch failed, awaiting snapshot");
                self.reset();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shoin_patch::PatchOperation;

    fn snapshot() -> SyncMessage {
        SyncMessage::Snapshot(json!({
            "documents": {"1": {"title": "one"}, "2": {"title": "two"}},
            "meta": {"rev": 1}
        }))
    }

    #[test]
    fn test_initial_snapshot() {
        let mut state = SyncState::new();
        assert_eq!(state.apply(snapshot()).unwrap(), SyncResult::Snapshot);
        assert_eq!(state.version(), 1);
        assert!(state.document().is_some());
    }

    #[test]
    fn test_patch_before_snapshot_skips() {
        let mut state = SyncState::new();
        let result = state
            .apply(SyncMessage::Patch(vec![PatchOperation::add("/x", json!(1))]))
            .unwrap();
        assert_eq!(result, SyncResult::Skipped { reason: SkipReason::NoBase });
        assert!(state.document().is_none());
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_patch_reports_documents() {
        let mut state = SyncState::new();
        state.apply(snapshot()).unwrap();
        let result = state
            .apply(SyncMessage::Patch(vec![
                PatchOperation::replace("/documents/2/title", json!("TWO")),
                PatchOperation::replace("/meta/rev", json!(2)),
            ]))
            .unwrap();
        assert_eq!(
            result,
            SyncResult::Patched {
                documents: HashSet::from(["2".to_string()])
            }
        );
        assert_eq!(state.version(), 2);
        assert_eq!(state.document().unwrap()["documents"]["2"]["title"], json!("TWO"));
    }

    #[test]
    fn test_failure_keeps_document_and_awaits_snapshot() {
        let mut state = SyncState::new();
        state.apply(snapshot()).unwrap();
        let before = state.document().cloned().unwrap();

        let err = state
            .apply(SyncMessage::Patch(vec![PatchOperation::remove("/documents/9")]))
            .unwrap_err();
        assert!(matches!(err, SyncError::Reconcile(_)));
        assert!(state.awaiting_snapshot());
        assert_eq!(state.document().unwrap(), &before);
        assert_eq!(state.version(), 1);

        // further patches are skipped, even valid ones
        let result = state
            .apply(SyncMessage::Patch(vec![PatchOperation::replace("/meta/rev", json!(5))]))
            .unwrap();
        assert_eq!(result, SyncResult::Skipped { reason: SkipReason::AwaitingSnapshot });

        // a snapshot recovers
        assert_eq!(state.apply(snapshot()).unwrap(), SyncResult::Snapshot);
        assert!(!state.awaiting_snapshot());
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn test_clear_forgets_document() {
        let mut state = SyncState::new();
        state.apply(snapshot()).unwrap();
        state.reset();
        state.clear();
        assert!(state.document().is_none());
        assert!(!state.awaiting_snapshot());
    }
}
