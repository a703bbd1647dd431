//! In-process transport backed by channels.
//!
//! Used by tests and by embedders that run the server side in the same
//! process. [`memory_transport`] returns the client-side [`MemoryTransport`]
//! and a [`MemoryListener`] that plays the server: it accepts connections,
//! can refuse new ones, and counts open attempts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::transport::{Connection, Transport, TransportError};

#[derive(Default)]
struct Shared {
    refusing: AtomicBool,
    attempts: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

/// Client half of the in-memory transport.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Server half: receives a [`MemoryPeer`] per successful open.
pub struct MemoryListener {
    shared: Arc<Shared>,
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Create a connected transport/listener pair.
pub fn memory_transport() -> (MemoryTransport, MemoryListener) {
    let shared = Arc::new(Shared::default());
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            shared: Arc::clone(&shared),
            accept_tx,
        },
        MemoryListener { shared, accept_rx },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.shared.urls.lock().push(url.to_string());

        if self.shared.refusing.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (to_server, server_rx) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            url: url.to_string(),
            tx: to_client,
            rx: server_rx,
        };
        self.accept_tx.send(peer).map_err(|_| TransportError::Connect {
            url: url.to_string(),
            reason: "listener dropped".into(),
        })?;

        Ok(Box::new(MemoryConnection {
            rx: client_rx,
            tx: to_server,
        }))
    }
}

struct MemoryConnection {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

impl MemoryListener {
    /// Wait for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Refuse (or stop refusing) new connections.
    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Number of `open` calls so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// URLs passed to `open`, in order.
    pub fn urls(&self) -> Vec<String> {
        self.shared.urls.lock().clone()
    }
}

/// Server side of one in-memory connection. Dropping it closes the
/// connection from the client's point of view.
pub struct MemoryPeer {
    url: String,
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push a frame to the client. `false` if the client has gone away.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.tx.send(frame.into()).is_ok()
    }

    /// Next frame the client sent, `None` once it is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
