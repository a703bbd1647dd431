//! Client runtime for Shoin project sync.
//!
//! A [`SessionHandle`] follows one project's authoritative state over a
//! [`Transport`], reconnecting with capped exponential backoff and
//! publishing a [`SessionView`] after every step. [`PendingTasks`] tracks
//! background work for the UI's status line.
//!
//! # Quick Start
//!
//! ```no_run
//! use shoin_client::{SessionConfig, WsTransport, spawn_session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = spawn_session(WsTransport, SessionConfig::default());
//! session.connect("ws://localhost:8080/sync", "project-1").await?;
//!
//! let mut view = session.watch();
//! while view.changed().await.is_ok() {
//!     let current = view.borrow_and_update().clone();
//!     println!("{} v{}", current.status, current.version);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`session`] | Actor owning the connection, sync state and retry timer |
//! | [`sync`] | Snapshot/patch bookkeeping for one document |
//! | [`backoff`] | Reconnect delay computation |
//! | [`tasks`] | Pending-task registry |
//! | [`transport`] | Transport traits; [`ws`] and [`memory`] implement them |

pub mod backoff;
pub mod config;
pub mod constants;
pub mod memory;
pub mod session;
pub mod sync;
pub mod tasks;
pub mod transport;
mod view;
pub mod ws;

pub use backoff::{BackoffConfig, compute_delay, compute_delay_with};
pub use config::{ConfigError, ResyncPolicy, SessionConfig};
pub use memory::{MemoryListener, MemoryPeer, MemoryTransport, memory_transport};
pub use session::{SessionError, SessionHandle, spawn_session, spawn_session_with};
pub use sync::{SkipReason, SyncError, SyncResult, SyncState};
pub use tasks::{PendingTaskGuard, PendingTasks, Subscription, TaskMap};
pub use transport::{Connection, Transport, TransportError, project_url};
pub use view::{ConnectionStatus, SessionEvent, SessionView};
pub use ws::WsTransport;

pub use shoin_patch::Document;
pub use shoin_types::{LockError, LockState};
