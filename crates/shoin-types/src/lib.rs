//! Shared lock and task types for Shoin.
//!
//! This crate is a pure leaf: it has **no internal shoin dependencies** and
//! no I/O. The rendering layer queries these types directly; the sync client
//! builds on them.
//!
//! # Key Types
//!
//! |---------------------|--------------------------------------------------|
//! | Type                | Purpose                                          |
//! |---------------------|--------------------------------------------------|
//! | [`LockState`]       | Who may edit a document region right now         |
//! | [`LockKind`]        | Discriminant of a lock, as it appears on the wire |
//! | [`PendingTask`]     | A named background operation (e.g. AI analysis)  |
//! |---------------------|--------------------------------------------------|

pub mod lock;
pub mod task;

pub use lock::{LockError, LockKind, LockState};
pub use task::{PendingTask, summarize};
