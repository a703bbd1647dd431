//! Transport seam between the sync session and the wire.
//!
//! A [`Transport`] opens connections; a [`Connection`] carries JSON text
//! frames in both directions. The session only ever talks to these traits,
//! so WebSocket ([`WsTransport`](crate::WsTransport)) and in-memory
//! ([`memory`](crate::memory)) transports are interchangeable.

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures. All of them are recovered by reconnecting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("timed out connecting to {0}")]
    Timeout(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("connection closed")]
    Closed,
}

/// Opens connections to a sync endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, TransportError>;
}

/// One open, bidirectional connection.
#[async_trait]
pub trait Connection: Send {
    /// Next inbound text frame. `None` once the connection is closed.
    ///
    /// Must be cancel-safe: the session polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Close the connection. Errors while closing are ignored.
    async fn close(&mut self);
}

/// URL of a project's sync stream: `{endpoint}/{project_id}`.
pub fn project_url(endpoint: &str, project_id: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), project_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url() {
        assert_eq!(project_url("ws://localhost:8080/sync", "p1"), "ws://localhost:8080/sync/p1");
        assert_eq!(project_url("ws://localhost:8080/sync/", "p1"), "ws://localhost:8080/sync/p1");
    }
}
