//! Sync wire messages.
//!
//! Server → client frames are JSON text:
//!
//! ```json
//! { "type": "snapshot", "data": { ... } }
//! { "type": "patch", "data": [ { "op": "replace", "path": "/a", "value": 1 } ] }
//! ```
//!
//! The only client → server frame is `{ "type": "resync" }`, asking the
//! server for a fresh snapshot.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::ops::PatchOperation;

/// A server-issued sync message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Full replacement of the document.
    Snapshot(Value),
    /// Ordered batch of operations against the current document.
    Patch(Vec<PatchOperation>),
}

/// Envelope used for decoding, so an unknown `type` can be told apart from
/// a broken frame.
#[derive(Deserialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<Value>,
}

impl SyncMessage {
    /// Decode a text frame.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let frame: Frame =
            serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match frame.kind.as_str() {
            "snapshot" => match frame.data {
                Some(data) => Ok(SyncMessage::Snapshot(data)),
                None => Err(DecodeError::InvalidPayload {
                    kind: "snapshot",
                    source: serde_json::Error::missing_field("data"),
                }),
            },
            "patch" => {
                let data = frame
                    .data
                    .ok_or_else(|| serde_json::Error::missing_field("data"))
                    .and_then(serde_json::from_value::<Vec<PatchOperation>>)
                    .map_err(|source| DecodeError::InvalidPayload {
                        kind: "patch",
                        source,
                    })?;
                Ok(SyncMessage::Patch(data))
            }
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Snapshot(_) => "snapshot",
            SyncMessage::Patch(_) => "patch",
        }
    }
}

/// Client → server frames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Ask for a fresh snapshot.
    Resync,
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
