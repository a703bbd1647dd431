//! What observers of a sync session see.
//!
//! [`SessionView`] is the latest-value state (watch channel); [`SessionEvent`]
//! is the stream of discrete happenings (broadcast channel) that consumers
//! use for change-driven invalidation.

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use shoin_patch::{Document, Pointer};
use shoin_types::{LockError, LockState};

/// Connection lifecycle status. Only the session changes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting to retry; `attempt` counts consecutive failures from 0.
    Reconnecting { attempt: u32 },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Anything but `Disconnected`.
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionStatus::Disconnected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("disconnected"),
            ConnectionStatus::Connecting => f.write_str("connecting"),
            ConnectionStatus::Connected => f.write_str("connected"),
            ConnectionStatus::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {attempt})")
            }
        }
    }
}

/// Consistent snapshot of a session, published after every complete step.
#[derive(Clone, Debug, Default)]
pub struct SessionView {
    /// Last good document, `None` before the first snapshot.
    pub document: Option<Document>,
    pub status: ConnectionStatus,
    /// Error behind the current trouble. A transport error clears on the
    /// next successful open, a desync error on the next snapshot.
    /// `status` plus this field is what observers show.
    pub last_error: Option<String>,
    /// A patch failed to apply and no snapshot has arrived since.
    pub desynced: bool,
    /// Bumped on every applied snapshot or patch.
    pub version: u64,
}

impl SessionView {
    /// Decode the document into a typed model.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.document.as_deref().map(|doc| T::deserialize(doc))
    }

    /// Lock state of the region at `region` (a JSON Pointer).
    ///
    /// Reads the region's `lock` member. A missing document, region or
    /// member means unlocked.
    pub fn lock_at(&self, region: &str) -> Result<LockState, LockError> {
        let pointer =
            Pointer::parse(region).map_err(|e| LockError::Malformed(e.to_string()))?;
        let lock = self
            .document
            .as_deref()
            .and_then(|doc| pointer.resolve(doc))
            .and_then(|node| node.get("lock"));
        LockState::from_value(lock)
    }
}

/// Discrete session events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A snapshot replaced the document.
    SnapshotApplied { version: u64 },
    /// A patch touched these documents.
    DocumentsChanged { ids: HashSet<String>, version: u64 },
    /// A patch failed; the session is recovering.
    Desynchronized { error: String },
    /// An inbound frame was dropped.
    ProtocolWarning { message: String },
}
