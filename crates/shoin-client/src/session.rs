//! Sync session actor.
//!
//! One tokio task owns the connection, the [`SyncState`] and the retry
//! deadline. A cloneable [`SessionHandle`] drives it over mpsc; observers
//! read the latest [`SessionView`] from a watch channel and discrete
//! [`SessionEvent`]s from a broadcast channel.
//!
//! ```text
//!   SessionHandle (Clone)       mpsc       SessionActor (tokio task)
//!   ┌─────────────────────┐  ────────▶  ┌──────────────────────────────┐
//!   │ .connect()          │             │ connection + SyncState       │
//!   │ .disconnect()       │  ◀────────  │ open / retry deadline        │
//!   └─────────────────────┘   oneshot   └──────────────┬───────────────┘
//!   watch::Receiver<SessionView>  ◀───────────────────┤
//!   broadcast::Receiver<SessionEvent>  ◀──────────────┘
//! ```
//!
//! Commands, inbound frames, open completions and the retry deadline are
//! handled in a single `select!` loop, so `disconnect` cancels a pending
//! open or retry simply by dropping it.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use shoin_patch::{ClientMessage, SyncMessage};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backoff::compute_delay;
use crate::config::{ResyncPolicy, SessionConfig};
use crate::sync::{SyncResult, SyncState};
use crate::transport::{Connection, Transport, TransportError, project_url};
use crate::view::{ConnectionStatus, SessionEvent, SessionView};

/// Errors returned to [`SessionHandle`] callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session already active ({0})")]
    AlreadyActive(ConnectionStatus),
    #[error("session shut down")]
    Shutdown,
}

enum SessionCommand {
    Connect {
        endpoint: String,
        project_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running session.
///
/// The session task exits once every handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Start syncing `{endpoint}/{project_id}`.
    ///
    /// Only valid while disconnected. Returns once the open has started;
    /// transport failures show up in the view, never here.
    pub async fn connect(
        &self,
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Connect {
                endpoint: endpoint.into(),
                project_id: project_id.into(),
                reply,
            })
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)?
    }

    /// Stop syncing. After this returns no further connection attempt
    /// fires until the next [`connect`](Self::connect).
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Disconnect { reply })
            .map_err(|_| SessionError::Shutdown)?;
        rx.await.map_err(|_| SessionError::Shutdown)
    }

    /// Receiver for the latest view.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Copy of the current view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.view.borrow().status
    }

    /// Subscribe to session events from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Spawn a session on the current tokio runtime.
pub fn spawn_session<T: Transport>(transport: T, config: SessionConfig) -> SessionHandle {
    spawn_session_with(Arc::new(transport), config)
}

/// Like [`spawn_session`], for a transport that is already shared.
pub fn spawn_session_with(transport: Arc<dyn Transport>, config: SessionConfig) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (view_tx, view) = watch::channel(SessionView::default());
    let (events, _) = broadcast::channel(config.event_capacity.max(1));

    let actor = SessionActor {
        transport,
        config,
        url: None,
        connection: None,
        opening: None,
        retry_at: None,
        failures: 0,
        desync_streak: 0,
        sync: SyncState::new(),
        status: ConnectionStatus::Disconnected,
        last_error: None,
        desynced: false,
        view_tx,
        event_tx: events.clone(),
    };
    tokio::spawn(actor.run(rx));

    SessionHandle { tx, view, events }
}

/// Upper bound on a retry wait whose deadline would overflow `Instant`.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(86_400);

type OpenFuture = BoxFuture<'static, Result<Box<dyn Connection>, TransportError>>;

enum Wake {
    Command(SessionCommand),
    Frame(Option<Result<String, TransportError>>),
    Opened(Result<Box<dyn Connection>, TransportError>),
    Retry,
}

struct SessionActor {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    /// Target of the current connect; `None` while disconnected.
    url: Option<String>,
    connection: Option<Box<dyn Connection>>,
    opening: Option<OpenFuture>,
    retry_at: Option<Instant>,
    /// Consecutive failures since the last successful open.
    failures: u32,
    /// Desync recoveries since a patch last applied cleanly.
    desync_streak: u32,
    sync: SyncState,
    status: ConnectionStatus,
    last_error: Option<String>,
    desynced: bool,
    view_tx: watch::Sender<SessionView>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            let wake = tokio::select! {
                biased;
                cmd = rx.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => break,
                },
                opened = poll_opening(&mut self.opening) => Wake::Opened(opened),
                frame = next_frame(&mut self.connection) => Wake::Frame(frame),
                () = sleep_until(self.retry_at) => Wake::Retry,
            };

            match wake {
                Wake::Command(cmd) => self.handle_command(cmd).await,
                Wake::Opened(result) => {
                    self.opening = None;
                    self.on_opened(result).await;
                }
                Wake::Frame(Some(Ok(raw))) => self.handle_frame(&raw).await,
                Wake::Frame(Some(Err(e))) => self.on_transport_lost(e.to_string()).await,
                Wake::Frame(None) => {
                    self.on_transport_lost(TransportError::Closed.to_string()).await
                }
                Wake::Retry => {
                    self.retry_at = None;
                    debug!(status = %self.status, "retry deadline reached");
                    self.start_open();
                }
            }
        }

        debug!("session shutting down: all handles dropped");
        self.teardown().await;
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect {
                endpoint,
                project_id,
                reply,
            } => {
                if self.status.is_active() {
                    let _ = reply.send(Err(SessionError::AlreadyActive(self.status)));
                    return;
                }
                let url = project_url(&endpoint, &project_id);
                info!(url = %url, "connecting");
                self.url = Some(url);
                self.failures = 0;
                self.desync_streak = 0;
                self.sync.clear();
                self.desynced = false;
                self.last_error = None;
                self.status = ConnectionStatus::Connecting;
                self.start_open();
                self.publish();
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Disconnect { reply } => {
                if self.status.is_active() {
                    info!(url = ?self.url, "disconnecting");
                }
                self.teardown().await;
                self.url = None;
                self.status = ConnectionStatus::Disconnected;
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    /// Begin opening the target URL. Completion arrives as `Wake::Opened`.
    fn start_open(&mut self) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.connect_timeout;
        self.opening = Some(Box::pin(async move {
            let result = tokio::time::timeout(timeout, transport.open(&url)).await;
            match result {
                Ok(opened) => opened,
                Err(_) => Err(TransportError::Timeout(url)),
            }
        }));
    }

    async fn on_opened(&mut self, result: Result<Box<dyn Connection>, TransportError>) {
        match result {
            Ok(connection) => {
                info!(url = ?self.url, after_failures = self.failures, "connected");
                self.connection = Some(connection);
                self.failures = 0;
                self.status = ConnectionStatus::Connected;
                // a desync error stays until the snapshot that resolves it
                if !self.desynced {
                    self.last_error = None;
                }
                // a fresh connection always starts with a snapshot
                self.sync.reset();
                self.publish();
            }
            Err(e) => self.on_transport_lost(e.to_string()).await,
        }
    }

    async fn on_transport_lost(&mut self, error: String) {
        warn!(url = ?self.url, error = %error, "transport lost");
        self.last_error = Some(error);
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        self.schedule_retry();
        self.publish();
    }

    fn schedule_retry(&mut self) {
        let attempt = self.failures;
        self.failures = self.failures.saturating_add(1);
        self.retry_after(attempt);
    }

    /// Status `Reconnecting { attempt }`, reopen after `compute_delay(attempt)`.
    fn retry_after(&mut self, attempt: u32) {
        let delay = compute_delay(attempt, &self.config.backoff);
        self.status = ConnectionStatus::Reconnecting { attempt };
        let now = Instant::now();
        self.retry_at = Some(now.checked_add(delay).unwrap_or(now + MAX_RETRY_WAIT));
        info!(attempt, ?delay, "scheduling reconnect");
    }

    async fn handle_frame(&mut self, raw: &str) {
        let message = match SyncMessage::decode(raw) {
            Ok(message) => message,
            Err(e) if e.is_state_error() => {
                self.on_desync(e.to_string()).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "dropping inbound frame");
                self.emit(SessionEvent::ProtocolWarning {
                    message: e.to_string(),
                });
                return;
            }
        };

        match self.sync.apply(message) {
            Ok(SyncResult::Snapshot) => {
                let version = self.sync.version();
                debug!(version, "snapshot applied");
                self.desynced = false;
                self.last_error = None;
                self.publish();
                self.emit(SessionEvent::SnapshotApplied { version });
            }
            Ok(SyncResult::Patched { documents }) => {
                let version = self.sync.version();
                debug!(version, documents = documents.len(), "patch applied");
                self.desync_streak = 0;
                self.publish();
                self.emit(SessionEvent::DocumentsChanged {
                    ids: documents,
                    version,
                });
            }
            Ok(SyncResult::Skipped { reason }) => {
                debug!(?reason, "patch skipped");
            }
            Err(e) => self.on_desync(e.to_string()).await,
        }
    }

    /// Keep the last good document and recover per [`ResyncPolicy`].
    ///
    /// The first reconnect after a clean patch is immediate; repeated
    /// desyncs back off like transport failures.
    async fn on_desync(&mut self, error: String) {
        warn!(error = %error, policy = ?self.config.resync, "desynchronized");
        self.desynced = true;
        self.last_error = Some(error.clone());
        self.sync.reset();
        self.emit(SessionEvent::Desynchronized { error });

        if self.config.resync == ResyncPolicy::Request && self.request_resync().await {
            self.publish();
            return;
        }

        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        let streak = self.desync_streak;
        self.desync_streak = self.desync_streak.saturating_add(1);
        if streak == 0 {
            self.status = ConnectionStatus::Connecting;
            self.start_open();
        } else {
            self.retry_after(streak - 1);
        }
        self.publish();
    }

    /// Ask the server for a snapshot on the live connection.
    async fn request_resync(&mut self) -> bool {
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        let frame = match ClientMessage::Resync.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode resync request");
                return false;
            }
        };
        match connection.send(frame).await {
            Ok(()) => {
                debug!("resync requested");
                true
            }
            Err(e) => {
                warn!(error = %e, "resync request failed, reconnecting");
                false
            }
        }
    }

    /// Drop any pending open and retry, and close the connection.
    async fn teardown(&mut self) {
        self.opening = None;
        self.retry_at = None;
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(SessionView {
            document: self.sync.document().cloned(),
            status: self.status,
            last_error: self.last_error.clone(),
            desynced: self.desynced,
            version: self.sync.version(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

async fn poll_opening(
    opening: &mut Option<OpenFuture>,
) -> Result<Box<dyn Connection>, TransportError> {
    match opening {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

async fn next_frame(
    connection: &mut Option<Box<dyn Connection>>,
) -> Option<Result<String, TransportError>> {
    match connection {
        Some(connection) => connection.recv().await,
        None => pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}
